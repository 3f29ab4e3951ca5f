use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sitewalk_core::config::{AppConfig, RemoteConfig};
use sitewalk_core::connectivity::NetworkSignal;
use sitewalk_core::remote::{RemoteAdapter, SupabaseRemote, UnconfiguredRemote};
use sitewalk_core::{InspectionLog, LocalStore, Site, SyncEngine};

use crate::error::CliError;

/// Resolved file locations for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl CliContext {
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(cli_db_path)?,
            config_path: resolve_config_path(cli_config_path)?,
        })
    }

    /// Config file merged with environment overrides.
    pub fn load_config(&self) -> Result<AppConfig, CliError> {
        let config = AppConfig::load_from_path(&self.config_path)?;
        Ok(config.with_remote_overrides(RemoteConfig::from_env()))
    }

    pub async fn open_engine(&self, network: NetworkSignal) -> Result<SyncEngine, CliError> {
        let config = self.load_config()?;
        let store = LocalStore::open_path(self.db_path.clone()).await?;
        let remote = build_remote(&config.remote)?;
        Ok(SyncEngine::new(store, remote, network, config.sync))
    }
}

pub fn build_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteAdapter>, CliError> {
    match SupabaseRemote::from_config(config)? {
        Some(remote) => Ok(Arc::new(remote)),
        None => {
            tracing::debug!("No remote credentials; running local-only");
            Ok(Arc::new(UnconfiguredRemote))
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("SITEWALK_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    Ok(dirs::data_dir()
        .ok_or(CliError::MissingDirectory("data"))?
        .join("sitewalk")
        .join("sitewalk.db"))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) =
        cli_config_path.or_else(|| env::var_os("SITEWALK_CONFIG").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_config_path()
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    Ok(dirs::config_dir()
        .ok_or(CliError::MissingDirectory("config"))?
        .join("sitewalk")
        .join("sitewalk.json"))
}

/// Read a JSON document from a file, or stdin for `-`.
pub fn read_json_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Write rendered output to a file, or stdout when no path is given.
pub fn write_output(rendered: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SiteListItem {
    pub id: String,
    pub name: String,
    pub areas: usize,
    pub points: usize,
    pub synced: bool,
}

pub fn site_to_list_item(site: &Site) -> SiteListItem {
    SiteListItem {
        id: site.id.clone(),
        name: site.name.clone(),
        areas: site.areas.len(),
        points: site.point_count(),
        synced: site.synced.unwrap_or(false),
    }
}

pub fn format_site_lines(sites: &[Site]) -> Vec<String> {
    sites
        .iter()
        .map(|site| {
            format!(
                "{}  {}  ({} areas, {} points){}",
                site.id,
                site.name,
                site.areas.len(),
                site.point_count(),
                pending_marker(site.synced)
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct InspectionListItem {
    pub id: String,
    pub site_name: String,
    pub date: String,
    pub relative_time: Option<String>,
    pub inspector_name: String,
    pub passed: usize,
    pub total: usize,
    pub synced: bool,
}

pub fn inspection_to_list_item(log: &InspectionLog, now_ms: i64) -> InspectionListItem {
    InspectionListItem {
        id: log.id.clone(),
        site_name: log.site_name.clone(),
        date: log.date.clone(),
        relative_time: log
            .date_millis()
            .map(|date_ms| format_relative_time(date_ms, now_ms)),
        inspector_name: log.inspector_name.clone(),
        passed: log.passed_count(),
        total: log.answers.len(),
        synced: log.synced.unwrap_or(false),
    }
}

pub fn format_inspection_lines(logs: &[&InspectionLog], now_ms: i64) -> Vec<String> {
    logs.iter()
        .map(|log| {
            let when = log
                .date_millis()
                .map_or_else(|| log.date.clone(), |date_ms| format_relative_time(date_ms, now_ms));
            format!(
                "{}  {:<10}  {}  {}  {}/{} OK{}",
                short_id(&log.id),
                when,
                log.site_name,
                log.inspector_name,
                log.passed_count(),
                log.answers.len(),
                pending_marker(log.synced)
            )
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

const fn pending_marker(synced: Option<bool>) -> &'static str {
    match synced {
        Some(true) => "",
        _ => "  [pending]",
    }
}
