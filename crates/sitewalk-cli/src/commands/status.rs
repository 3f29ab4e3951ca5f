use serde::Serialize;
use sitewalk_core::connectivity::NetworkSignal;

use crate::commands::common::CliContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub config_path: String,
    pub sites: usize,
    pub pending_sites: usize,
    pub inspections: usize,
    pub pending_inspections: usize,
    pub remote_configured: bool,
    pub remote_reachable: Option<bool>,
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let remote = match (report.remote_configured, report.remote_reachable) {
        (false, _) => "not configured (local-only)".to_string(),
        (true, Some(true)) => "reachable".to_string(),
        (true, _) => "unreachable".to_string(),
    };
    vec![
        format!("Database:    {}", report.db_path),
        format!("Config:      {}", report.config_path),
        format!("Sites:       {} ({} pending)", report.sites, report.pending_sites),
        format!(
            "Inspections: {} ({} pending)",
            report.inspections, report.pending_inspections
        ),
        format!("Remote:      {remote}"),
    ]
}

pub async fn run_status(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let engine = ctx.open_engine(NetworkSignal::default()).await?;
    let store = engine.store();

    let remote_configured = engine.remote().is_configured();
    let remote_reachable = if remote_configured {
        Some(engine.remote().ping().await.is_ok())
    } else {
        None
    };

    let report = StatusReport {
        db_path: ctx.db_path.display().to_string(),
        config_path: ctx.config_path.display().to_string(),
        sites: store.get_sites().await?.len(),
        pending_sites: store.pending_sites().await?.len(),
        inspections: store.get_inspections().await?.len(),
        pending_inspections: store.pending_inspections().await?.len(),
        remote_configured,
        remote_reachable,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
