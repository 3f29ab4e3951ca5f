//! Connectivity monitoring.
//!
//! [`NetworkSignal`] is the host's online/offline signal. The
//! [`ConnectivityMonitor`] turns transitions to online into sync passes, and
//! the [`ReachabilityProbe`] feeds the signal by pinging the remote when the
//! host has no native network-state events.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::remote::{RemoteAdapter, RemoteError};
use crate::state::SyncState;
use crate::sync::{SyncEngine, SyncReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    Unknown,
}

/// Shared, observable network state.
#[derive(Clone, Debug)]
pub struct NetworkSignal {
    tx: Arc<watch::Sender<NetworkStatus>>,
}

impl Default for NetworkSignal {
    fn default() -> Self {
        Self::new(NetworkStatus::Unknown)
    }
}

impl NetworkSignal {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(NetworkStatus::Online)
    }

    pub fn offline() -> Self {
        Self::new(NetworkStatus::Offline)
    }

    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    /// Record a new status. Observers are only woken on an actual transition.
    pub fn set(&self, status: NetworkStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    /// Only an explicit offline signal rules out a remote attempt.
    pub fn may_reach_remote(&self) -> bool {
        self.status() != NetworkStatus::Offline
    }
}

/// Runs sync passes on online transitions and publishes the display state.
pub struct ConnectivityMonitor {
    engine: SyncEngine,
    state: watch::Sender<SyncState>,
}

impl ConnectivityMonitor {
    pub fn new(engine: SyncEngine) -> Self {
        let initial = if engine.network().status() == NetworkStatus::Offline {
            SyncState::Offline
        } else {
            SyncState::Synced
        };
        let (state, _rx) = watch::channel(initial);
        Self { engine, state }
    }

    /// Display state for status indicators.
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Run a pass now and publish the resulting state.
    pub async fn trigger(&self) -> SyncReport {
        self.state.send_replace(SyncState::Syncing);
        let report = self.engine.sync_pending_data().await;
        let next = if !self.engine.network().may_reach_remote() {
            SyncState::Offline
        } else if report.failed > 0 {
            SyncState::Error
        } else {
            SyncState::Synced
        };
        self.state.send_replace(next);
        report
    }

    /// Watch the network signal until `shutdown` resolves.
    ///
    /// Syncs once at start when already online, then on every transition to
    /// online. Going offline only updates the published state.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut network = self.engine.network().subscribe();

        let initial = *network.borrow_and_update();
        self.apply(initial).await;

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *network.borrow_and_update();
                    self.apply(status).await;
                }
            }
        }

        tracing::debug!("Connectivity monitor stopped");
    }

    async fn apply(&self, status: NetworkStatus) {
        match status {
            NetworkStatus::Online => {
                tracing::info!("Network online; syncing pending data");
                let report = self.trigger().await;
                tracing::info!("{}", report.summary());
            }
            NetworkStatus::Offline => {
                tracing::info!("Network offline; working locally");
                self.state.send_replace(SyncState::Offline);
            }
            NetworkStatus::Unknown => {}
        }
    }
}

/// Feeds a [`NetworkSignal`] from periodic remote pings.
pub struct ReachabilityProbe {
    remote: Arc<dyn RemoteAdapter>,
    signal: NetworkSignal,
    interval: Duration,
}

impl ReachabilityProbe {
    pub fn new(remote: Arc<dyn RemoteAdapter>, signal: NetworkSignal, interval: Duration) -> Self {
        Self {
            remote,
            signal,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Ping once and publish the observed status.
    pub async fn probe_once(&self) -> NetworkStatus {
        let status = match self.remote.ping().await {
            Ok(()) => NetworkStatus::Online,
            Err(RemoteError::NotConfigured) => NetworkStatus::Unknown,
            Err(error) => {
                tracing::debug!("Remote unreachable: {}", error);
                NetworkStatus::Offline
            }
        };
        if self.signal.set(status) {
            tracing::debug!("Network status changed to {:?}", status);
        }
        status
    }

    /// Probe on a fixed interval until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::models::{InspectionLog, InspectionStatus};
    use crate::remote::MemoryRemote;
    use crate::store::LocalStore;

    fn log(id: &str) -> InspectionLog {
        InspectionLog {
            id: id.to_string(),
            site_id: "site-1".to_string(),
            site_name: "Cantera Los Álamos (Demo)".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            inspector_name: "Ana".to_string(),
            inspector_dni: "12345678A".to_string(),
            inspector_email: "ana@example.com".to_string(),
            answers: Vec::new(),
            status: InspectionStatus::Completed,
            synced: None,
        }
    }

    fn engine(remote: Arc<MemoryRemote>, signal: NetworkSignal) -> SyncEngine {
        SyncEngine::new(
            LocalStore::in_memory(),
            remote,
            signal,
            SyncSettings::default(),
        )
    }

    async fn wait_for_state(rx: &mut watch::Receiver<SyncState>, expected: SyncState) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == expected))
            .await
            .expect("state not reached in time")
            .expect("monitor dropped");
    }

    #[test]
    fn signal_only_reports_transitions() {
        let signal = NetworkSignal::offline();
        assert!(!signal.set(NetworkStatus::Offline));
        assert!(signal.set(NetworkStatus::Online));
        assert_eq!(signal.status(), NetworkStatus::Online);
        assert!(signal.may_reach_remote());
        assert!(NetworkSignal::default().may_reach_remote());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_triggers_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let signal = NetworkSignal::offline();
        let engine = engine(remote.clone(), signal.clone());

        assert!(!engine.save_inspection(log("log-1")).await.unwrap());
        assert!(remote.inspections().await.is_empty());

        let monitor = ConnectivityMonitor::new(engine.clone());
        let mut state = monitor.sync_state();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(monitor.run(async {
            stop_rx.await.ok();
        }));

        wait_for_state(&mut state, SyncState::Offline).await;
        signal.set(NetworkStatus::Online);
        wait_for_state(&mut state, SyncState::Synced).await;

        assert_eq!(remote.inspections().await.len(), 1);
        assert!(engine.store().pending_inspections().await.unwrap().is_empty());

        signal.set(NetworkStatus::Offline);
        wait_for_state(&mut state, SyncState::Offline).await;

        stop_tx.send(()).ok();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn already_online_syncs_at_start() {
        let remote = Arc::new(MemoryRemote::new());
        let signal = NetworkSignal::offline();
        let engine = engine(remote.clone(), signal.clone());
        engine.save_inspection(log("log-1")).await.unwrap();
        signal.set(NetworkStatus::Online);

        let monitor = ConnectivityMonitor::new(engine);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(monitor.run(async {
            stop_rx.await.ok();
        }));

        tokio::time::timeout(Duration::from_secs(5), async {
            while remote.inspections().await.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("startup sync did not run");

        stop_tx.send(()).ok();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn probe_maps_ping_results_to_status() {
        let remote = Arc::new(MemoryRemote::new());
        let signal = NetworkSignal::default();
        let probe = ReachabilityProbe::new(remote.clone(), signal.clone(), Duration::from_secs(30));

        assert_eq!(probe.probe_once().await, NetworkStatus::Online);
        remote.set_failing(true);
        assert_eq!(probe.probe_once().await, NetworkStatus::Offline);
        assert_eq!(signal.status(), NetworkStatus::Offline);

        let unconfigured = ReachabilityProbe::new(
            Arc::new(MemoryRemote::unconfigured()),
            NetworkSignal::default(),
            Duration::from_secs(30),
        );
        assert_eq!(unconfigured.probe_once().await, NetworkStatus::Unknown);
    }
}
