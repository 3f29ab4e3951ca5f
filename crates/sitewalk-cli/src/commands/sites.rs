use std::path::Path;

use serde::Deserialize;
use sitewalk_core::connectivity::NetworkSignal;
use sitewalk_core::Site;

use crate::commands::common::{
    format_site_lines, read_json_input, site_to_list_item, CliContext, SiteListItem,
};
use crate::error::CliError;

/// Import payload: one site or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SiteImport {
    Many(Vec<Site>),
    One(Box<Site>),
}

impl SiteImport {
    pub fn into_sites(self) -> Vec<Site> {
        match self {
            Self::Many(sites) => sites,
            Self::One(site) => vec![*site],
        }
    }
}

pub fn parse_site_import(raw: &str) -> Result<Vec<Site>, CliError> {
    let sites = serde_json::from_str::<SiteImport>(raw)
        .map_err(|error| CliError::InvalidInput(format!("not a site or list of sites: {error}")))?
        .into_sites();
    if sites.is_empty() {
        return Err(CliError::InvalidInput("no sites to import".to_string()));
    }
    Ok(sites)
}

pub async fn run_sites_list(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let engine = ctx.open_engine(NetworkSignal::offline()).await?;
    let sites = engine.get_sites().await?;

    if as_json {
        let json_items = sites
            .iter()
            .map(site_to_list_item)
            .collect::<Vec<SiteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if sites.is_empty() {
        println!("No sites configured.");
    } else {
        for line in format_site_lines(&sites) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_sites_import(file: &Path, ctx: &CliContext) -> Result<(), CliError> {
    let sites = parse_site_import(&read_json_input(file)?)?;
    for site in &sites {
        site.validate()?;
    }

    let engine = ctx.open_engine(NetworkSignal::default()).await?;
    for site in sites {
        let id = site.id.clone();
        let uploaded = engine.save_site(site).await?;
        if uploaded {
            println!("Saved site {id}");
        } else {
            println!("Saved site {id} (pending upload)");
        }
    }
    Ok(())
}

/// Notice for a local delete whose remote removal failed. The queued
/// deletion lives only as long as this process.
pub fn remote_delete_pending_notice(id: &str) -> String {
    format!(
        "Deleted site {id} locally, but the remote copy could not be removed. \
         It will come back on the next sync unless you delete it again while \
         the remote is reachable."
    )
}

pub async fn run_sites_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::InvalidInput("site id cannot be empty".to_string()));
    }

    let engine = ctx.open_engine(NetworkSignal::default()).await?;
    if !engine.delete_site(id).await? {
        return Err(CliError::SiteNotFound(id.to_string()));
    }

    if engine.pending_deletions().await.iter().any(|pending| pending == id) {
        println!("{}", remote_delete_pending_notice(id));
    } else {
        println!("Deleted site {id}");
    }
    Ok(())
}
