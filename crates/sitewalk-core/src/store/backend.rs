//! Storage backends for the named local entries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::db::{Database, LibSqlEntryRepository};
use crate::error::{Error, Result};

/// Key-value persistence holding one raw payload per named entry.
///
/// A write replaces the whole entry atomically; readers never observe a
/// partially written value.
#[async_trait]
pub trait EntryBackend: Send + Sync {
    /// Raw payload stored under `key`, `None` if it was never written.
    async fn read_entry(&self, key: &str) -> Result<Option<String>>;

    /// Replace the payload stored under `key`.
    async fn write_entry(&self, key: &str, value: &str) -> Result<()>;
}

/// Durable backend on a local libSQL database.
#[derive(Clone)]
pub struct LibSqlEntryBackend {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LibSqlEntryBackend {
    /// Open (or create) the store database at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location of the database, `None` when in memory.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }
}

#[async_trait]
impl EntryBackend for LibSqlEntryBackend {
    async fn read_entry(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.get_entry(key).await
    }

    async fn write_entry(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.set_entry(key, value).await
    }
}

/// Process-local backend; contents vanish with the process.
#[derive(Default)]
pub struct MemoryEntryBackend {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryEntryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-existing raw payloads, e.g. a damaged entry.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent writes fail as if storage were full.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntryBackend for MemoryEntryBackend {
    async fn read_entry(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write_entry(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Database(format!(
                "storage quota exceeded while writing {key}"
            )));
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn libsql_backend_persists_across_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("sitewalk.db");

        {
            let backend = LibSqlEntryBackend::open_path(&db_path).await.unwrap();
            backend.write_entry("sp_inspections", "[]").await.unwrap();
            assert_eq!(backend.db_path(), Some(&db_path));
        }

        let reopened = LibSqlEntryBackend::open_path(&db_path).await.unwrap();
        assert_eq!(
            reopened.read_entry("sp_inspections").await.unwrap().as_deref(),
            Some("[]")
        );
    }

    #[tokio::test]
    async fn memory_backend_can_fail_writes() {
        let backend = MemoryEntryBackend::with_entries([("sp_sites", "[]")]);
        backend.set_fail_writes(true);
        assert!(backend.write_entry("sp_sites", "[1]").await.is_err());
        assert_eq!(
            backend.read_entry("sp_sites").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
