use sitewalk_core::connectivity::NetworkSignal;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &CliContext) -> Result<(), CliError> {
    let engine = ctx.open_engine(NetworkSignal::default()).await?;
    if !engine.remote().is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let report = engine.sync_pending_data().await;
    println!("{report}");
    if report.failed > 0 {
        return Err(CliError::SyncIncomplete(report.failed));
    }
    Ok(())
}
