use std::io;

use sitewalk_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] sitewalk_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Site not found: {0}")]
    SiteNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Could not resolve a {0} directory; pass the path explicitly")]
    MissingDirectory(&'static str),
    #[error(
        "Sync is not configured. Set SITEWALK_SUPABASE_URL and SITEWALK_SUPABASE_ANON_KEY, or add a remote section to sitewalk.json."
    )]
    SyncNotConfigured,
    #[error("Sync finished with {0} failure(s); pending records will be retried")]
    SyncIncomplete(usize),
}
