//! sitewalk CLI - record site inspections offline and sync them later
//!
//! Every command works against the local store first; the remote is only
//! contacted when credentials are configured.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, InspectionsCommands, SitesCommands};
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::inspections::{
    run_inspections_export, run_inspections_list, run_inspections_record,
};
use crate::commands::sites::{run_sites_delete, run_sites_import, run_sites_list};
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitewalk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let ctx = CliContext::resolve(cli.db_path, cli.config)?;

    match cli.command {
        Commands::Sites { command } => match command {
            SitesCommands::List { json } => run_sites_list(json, &ctx).await?,
            SitesCommands::Import { file } => run_sites_import(&file, &ctx).await?,
            SitesCommands::Delete { id } => run_sites_delete(&id, &ctx).await?,
        },
        Commands::Inspections { command } => match command {
            InspectionsCommands::List { pending, json } => {
                run_inspections_list(pending, json, &ctx).await?;
            }
            InspectionsCommands::Record { file } => run_inspections_record(&file, &ctx).await?,
            InspectionsCommands::Export { format, output } => {
                run_inspections_export(format, output.as_deref(), &ctx).await?;
            }
        },
        Commands::Sync => run_sync(&ctx).await?,
        Commands::Status { json } => run_status(json, &ctx).await?,
        Commands::Watch { interval } => run_watch(interval, &ctx).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
