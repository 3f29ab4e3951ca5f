//! In-process remote store, used for offline demos and tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RemoteAdapter, RemoteError, RemoteResult};
use crate::models::{InspectionLog, Site};

/// Remote tables kept in memory with upsert-by-id semantics.
#[derive(Debug)]
pub struct MemoryRemote {
    configured: bool,
    failing: AtomicBool,
    sites: RwLock<Vec<Site>>,
    inspections: RwLock<Vec<InspectionLog>>,
    upload_attempts: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            configured: true,
            failing: AtomicBool::new(false),
            sites: RwLock::new(Vec::new()),
            inspections: RwLock::new(Vec::new()),
            upload_attempts: AtomicUsize::new(0),
        }
    }

    /// Remote that reports itself as lacking credentials.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Simulate a network or server failure on every call.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a site as if another device had uploaded it.
    pub async fn insert_site(&self, site: Site) {
        upsert_by_id(&mut *self.sites.write().await, site, |s| &s.id);
    }

    pub async fn sites(&self) -> Vec<Site> {
        self.sites.read().await.clone()
    }

    pub async fn inspections(&self) -> Vec<InspectionLog> {
        self.inspections.read().await.clone()
    }

    /// Upload calls received, successful or not.
    pub fn upload_attempts(&self) -> usize {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    fn check(&self) -> RemoteResult<()> {
        if !self.configured {
            return Err(RemoteError::NotConfigured);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Api("simulated remote failure (503)".to_string()));
        }
        Ok(())
    }
}

fn upsert_by_id<T>(records: &mut Vec<T>, record: T, id: impl Fn(&T) -> &String) {
    match records.iter().position(|existing| id(existing) == id(&record)) {
        Some(index) => records[index] = record,
        None => records.push(record),
    }
}

#[async_trait]
impl RemoteAdapter for MemoryRemote {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn ping(&self) -> RemoteResult<()> {
        self.check()
    }

    async fn upsert_site(&self, site: &Site) -> RemoteResult<()> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        upsert_by_id(&mut *self.sites.write().await, site.clone(), |s| &s.id);
        Ok(())
    }

    async fn delete_site(&self, site_id: &str) -> RemoteResult<()> {
        self.check()?;
        self.sites.write().await.retain(|site| site.id != site_id);
        Ok(())
    }

    async fn upsert_inspection(&self, log: &InspectionLog) -> RemoteResult<()> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        upsert_by_id(&mut *self.inspections.write().await, log.clone(), |l| &l.id);
        Ok(())
    }

    async fn fetch_sites(&self) -> RemoteResult<Vec<Site>> {
        self.check()?;
        Ok(self.sites.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seed_sites;

    #[tokio::test]
    async fn upserts_replace_by_id() {
        let remote = MemoryRemote::new();
        let mut site = seed_sites().remove(0);
        remote.upsert_site(&site).await.unwrap();
        site.name = "Renamed".to_string();
        remote.upsert_site(&site).await.unwrap();

        let sites = remote.sites().await;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "Renamed");
        assert_eq!(remote.upload_attempts(), 2);
    }

    #[tokio::test]
    async fn failing_remote_rejects_calls() {
        let remote = MemoryRemote::new();
        remote.set_failing(true);
        assert!(remote.ping().await.is_err());
        assert!(remote.fetch_sites().await.is_err());

        let unconfigured = MemoryRemote::unconfigured();
        assert!(!unconfigured.is_configured());
        assert!(matches!(
            unconfigured.ping().await,
            Err(RemoteError::NotConfigured)
        ));
    }
}
