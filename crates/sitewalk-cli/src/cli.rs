use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sitewalk")]
#[command(about = "Record site inspections offline and sync them when connected")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage site configurations
    Sites {
        #[command(subcommand)]
        command: SitesCommands,
    },
    /// Record and review inspection logs
    #[command(alias = "logs")]
    Inspections {
        #[command(subcommand)]
        command: InspectionsCommands,
    },
    /// Upload pending records and pull new sites
    Sync,
    /// Show local and remote state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing whenever the remote becomes reachable
    Watch {
        /// Seconds between reachability checks
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SitesCommands {
    /// List configured sites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save sites from a JSON file (`-` reads stdin)
    Import {
        /// File holding one site or an array of sites
        file: PathBuf,
    },
    /// Delete a site
    Delete {
        /// Site ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum InspectionsCommands {
    /// List inspection logs, newest first
    List {
        /// Only logs not yet uploaded
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save an inspection log from a JSON file (`-` reads stdin)
    Record {
        /// File holding the inspection log
        file: PathBuf,
    },
    /// Export inspection history
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for sitewalk_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
