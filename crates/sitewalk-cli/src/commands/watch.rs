use std::time::Duration;

use sitewalk_core::connectivity::{ConnectivityMonitor, NetworkSignal, ReachabilityProbe};
use tokio::sync::watch;

use crate::commands::common::CliContext;
use crate::error::CliError;

/// Probe interval, preferring a positive command-line value.
pub fn resolve_probe_interval(cli_interval: Option<u64>, configured: Duration) -> Duration {
    cli_interval
        .filter(|secs| *secs > 0)
        .map_or(configured, Duration::from_secs)
}

pub async fn run_watch(interval: Option<u64>, ctx: &CliContext) -> Result<(), CliError> {
    let config = ctx.load_config()?;
    let signal = NetworkSignal::default();
    let engine = ctx.open_engine(signal.clone()).await?;
    if !engine.remote().is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let probe_interval = resolve_probe_interval(interval, config.sync.probe_interval());
    let probe = ReachabilityProbe::new(engine.remote().clone(), signal, probe_interval);
    let monitor = ConnectivityMonitor::new(engine);
    let mut states = monitor.sync_state();

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.changed().await;
    };

    let monitor_task = tokio::spawn(monitor.run(stopped(stop_rx.clone())));
    let probe_task = tokio::spawn(probe.run(stopped(stop_rx.clone())));
    let printer_task = tokio::spawn({
        let mut stop_rx = stop_rx;
        async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        println!("sync state: {state}");
                    }
                }
            }
        }
    });

    println!(
        "Watching remote every {}s; press Ctrl-C to stop",
        probe_interval.as_secs()
    );
    tokio::signal::ctrl_c().await?;
    let _ = stop_tx.send(true);

    for task in [monitor_task, probe_task, printer_task] {
        if let Err(error) = task.await {
            tracing::warn!("Watch task ended abnormally: {}", error);
        }
    }
    Ok(())
}
