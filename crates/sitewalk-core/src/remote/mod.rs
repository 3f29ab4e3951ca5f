//! Remote store adapter.
//!
//! The remote side is a table-oriented backend with a `sites` and an
//! `inspections` table. Every write is an upsert keyed by record id so that a
//! retried upload after a dropped response is harmless.

mod memory;
mod supabase;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{InspectionLog, Site};

pub use memory::MemoryRemote;
pub use supabase::{normalize_rest_url, SupabaseRemote};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store is not configured.")]
    NotConfigured,
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Remote API error: {0}")]
    Api(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Thin client to the remote tables. All calls are best-effort from the
/// caller's point of view.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Whether credentials are present. An unconfigured remote is a normal
    /// steady state, not an error.
    fn is_configured(&self) -> bool;

    /// Cheap reachability check.
    async fn ping(&self) -> RemoteResult<()>;

    async fn upsert_site(&self, site: &Site) -> RemoteResult<()>;

    async fn delete_site(&self, site_id: &str) -> RemoteResult<()>;

    async fn upsert_inspection(&self, log: &InspectionLog) -> RemoteResult<()>;

    /// Every site currently stored remotely.
    async fn fetch_sites(&self) -> RemoteResult<Vec<Site>>;
}

/// Adapter used when no credentials are available.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemote;

#[async_trait]
impl RemoteAdapter for UnconfiguredRemote {
    fn is_configured(&self) -> bool {
        false
    }

    async fn ping(&self) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert_site(&self, _site: &Site) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_site(&self, _site_id: &str) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert_inspection(&self, _log: &InspectionLog) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch_sites(&self) -> RemoteResult<Vec<Site>> {
        Err(RemoteError::NotConfigured)
    }
}
