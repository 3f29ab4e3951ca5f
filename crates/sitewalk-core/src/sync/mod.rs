//! Offline-first sync engine.
//!
//! Every save is written locally first; the remote upload that follows is
//! best-effort. Records whose upload fails stay `synced == false` and are
//! retried by [`SyncEngine::sync_pending_data`], which also pulls sites
//! created on other devices.

mod backoff;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::SyncSettings;
use crate::connectivity::NetworkSignal;
use crate::error::Result;
use crate::models::{InspectionLog, Site};
use crate::remote::{RemoteAdapter, RemoteResult};
use crate::store::{Collection, LocalStore, MarkOutcome};

pub use backoff::RetryTracker;

/// Counts from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Inspection logs uploaded and confirmed
    pub synced_count: usize,
    pub synced_sites: usize,
    /// Remote sites appended locally
    pub pulled_sites: usize,
    /// Queued remote deletions that went through
    pub deleted_sites: usize,
    pub failed: usize,
    /// Records skipped because their retry delay has not elapsed
    pub deferred: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synced {} inspection(s) and {} site(s), pulled {} site(s), deleted {} remote site(s)",
            self.synced_count, self.synced_sites, self.pulled_sites, self.deleted_sites
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.deferred > 0 {
            write!(f, ", {} deferred", self.deferred)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushOutcome {
    Synced,
    Superseded,
    Failed,
}

/// Coordinates the local store and the remote adapter.
#[derive(Clone)]
pub struct SyncEngine {
    store: LocalStore,
    remote: Arc<dyn RemoteAdapter>,
    network: NetworkSignal,
    retries: Arc<Mutex<RetryTracker>>,
    pending_deletions: Arc<Mutex<HashSet<String>>>,
    pass: Arc<Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteAdapter>,
        network: NetworkSignal,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            remote,
            network,
            retries: Arc::new(Mutex::new(RetryTracker::from_settings(&settings))),
            pending_deletions: Arc::new(Mutex::new(HashSet::new())),
            pass: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteAdapter> {
        &self.remote
    }

    pub fn network(&self) -> &NetworkSignal {
        &self.network
    }

    /// Remote configured and not known to be offline.
    pub fn can_reach_remote(&self) -> bool {
        self.remote.is_configured() && self.network.may_reach_remote()
    }

    pub async fn get_sites(&self) -> Result<Vec<Site>> {
        self.store.get_sites().await
    }

    pub async fn get_inspections(&self) -> Result<Vec<InspectionLog>> {
        self.store.get_inspections().await
    }

    /// Save a site locally, then try to upload it.
    ///
    /// Returns whether the upload succeeded. Only a local write failure is an
    /// error; remote failures leave the site pending.
    pub async fn save_site(&self, site: Site) -> Result<bool> {
        site.validate()?;
        let stored = self.store.put_site(site).await?;
        self.pending_deletions.lock().await.remove(&stored.id);

        if !self.can_reach_remote() {
            return Ok(false);
        }
        let result = self.remote.upsert_site(&stored).await;
        Ok(self.confirm_upload(&stored, result, false).await != PushOutcome::Failed)
    }

    /// Save an inspection log locally, then try to upload it.
    ///
    /// The local write has completed before the upload starts, so the log is
    /// durable even if the upload never returns.
    pub async fn save_inspection(&self, log: InspectionLog) -> Result<bool> {
        let stored = self.store.put_inspection(log).await?;

        if !self.can_reach_remote() {
            return Ok(false);
        }
        let result = self.remote.upsert_inspection(&stored).await;
        Ok(self.confirm_upload(&stored, result, false).await != PushOutcome::Failed)
    }

    /// Remove a site locally, then try to remove it remotely.
    ///
    /// A remote deletion that cannot happen now is queued for later passes so
    /// the site is not pulled back in the meantime.
    pub async fn delete_site(&self, id: &str) -> Result<bool> {
        let removed = self.store.remove_site(id).await?;
        if !self.remote.is_configured() {
            return Ok(removed);
        }

        if self.network.may_reach_remote() {
            match self.remote.delete_site(id).await {
                Ok(()) => {
                    self.pending_deletions.lock().await.remove(id);
                    return Ok(removed);
                }
                Err(error) => {
                    tracing::warn!("Remote delete of site {} failed: {}", id, error);
                }
            }
        }

        self.pending_deletions.lock().await.insert(id.to_string());
        Ok(removed)
    }

    /// Site ids whose remote deletion is still outstanding.
    pub async fn pending_deletions(&self) -> Vec<String> {
        let mut ids = self
            .pending_deletions
            .lock()
            .await
            .iter()
            .cloned()
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Forget retry delays so the next pass attempts every pending record.
    pub async fn reset_backoff(&self) {
        self.retries.lock().await.reset();
    }

    /// Upload pending records, retry queued deletions, and pull new remote
    /// sites. Failures are counted, never raised.
    pub async fn sync_pending_data(&self) -> SyncReport {
        let mut report = SyncReport::default();
        if !self.can_reach_remote() {
            tracing::debug!("Skipping sync: remote not reachable");
            return report;
        }

        let _pass = self.pass.lock().await;

        match self.store.pending_inspections().await {
            Ok(logs) => {
                for log in logs {
                    if self.is_deferred(&log).await {
                        report.deferred += 1;
                        continue;
                    }
                    let result = self.remote.upsert_inspection(&log).await;
                    match self.confirm_upload(&log, result, true).await {
                        PushOutcome::Synced => report.synced_count += 1,
                        PushOutcome::Superseded => {}
                        PushOutcome::Failed => report.failed += 1,
                    }
                }
            }
            Err(error) => {
                tracing::warn!("Could not read pending inspections: {}", error);
                report.failed += 1;
            }
        }

        match self.store.pending_sites().await {
            Ok(sites) => {
                for site in sites {
                    if self.is_deferred(&site).await {
                        report.deferred += 1;
                        continue;
                    }
                    let result = self.remote.upsert_site(&site).await;
                    match self.confirm_upload(&site, result, true).await {
                        PushOutcome::Synced => report.synced_sites += 1,
                        PushOutcome::Superseded => {}
                        PushOutcome::Failed => report.failed += 1,
                    }
                }
            }
            Err(error) => {
                tracing::warn!("Could not read pending sites: {}", error);
                report.failed += 1;
            }
        }

        self.retry_deletions(&mut report).await;
        self.pull_sites(&mut report).await;

        if report.is_clean() {
            tracing::info!("{}", report);
        } else {
            tracing::warn!("{}", report);
        }
        report
    }

    async fn retry_deletions(&self, report: &mut SyncReport) {
        let queued = self.pending_deletions().await;
        for id in queued {
            match self.remote.delete_site(&id).await {
                Ok(()) => {
                    self.pending_deletions.lock().await.remove(&id);
                    report.deleted_sites += 1;
                }
                Err(error) => {
                    tracing::warn!("Remote delete of site {} failed again: {}", id, error);
                    report.failed += 1;
                }
            }
        }
    }

    async fn pull_sites(&self, report: &mut SyncReport) {
        let remote_sites = match self.remote.fetch_sites().await {
            Ok(sites) => sites,
            Err(error) => {
                tracing::warn!("Could not fetch remote sites: {}", error);
                report.failed += 1;
                return;
            }
        };

        let excluded = self.pending_deletions.lock().await.clone();
        match self.store.append_remote_sites(remote_sites, &excluded).await {
            Ok(appended) => report.pulled_sites = appended,
            Err(error) => {
                tracing::warn!("Could not store remote sites: {}", error);
                report.failed += 1;
            }
        }
    }

    async fn is_deferred<T: Collection>(&self, record: &T) -> bool {
        self.retries
            .lock()
            .await
            .is_deferred(&retry_key(record), Instant::now())
    }

    /// Settle one upload attempt: flip `synced` on success, track the
    /// failure otherwise. Only sync passes feed the backoff.
    async fn confirm_upload<T: Collection>(
        &self,
        record: &T,
        result: RemoteResult<()>,
        track_failure: bool,
    ) -> PushOutcome {
        let key = retry_key(record);
        if let Err(error) = result {
            tracing::warn!("Upload of {} failed: {}", key, error);
            if track_failure {
                let delay = self.retries.lock().await.record_failure(&key, Instant::now());
                tracing::debug!("Retrying {} in {:?}", key, delay);
            }
            return PushOutcome::Failed;
        }

        self.retries.lock().await.clear(&key);
        match self.store.mark_synced(record).await {
            Ok(MarkOutcome::Marked) => PushOutcome::Synced,
            Ok(MarkOutcome::Changed) => PushOutcome::Superseded,
            Ok(MarkOutcome::Missing) => {
                tracing::debug!("{} was removed during upload", key);
                PushOutcome::Superseded
            }
            Err(error) => {
                // Uploaded but still flagged pending; the next pass re-sends it.
                tracing::warn!("Could not mark {} as synced: {}", key, error);
                PushOutcome::Superseded
            }
        }
    }
}

fn retry_key<T: Collection>(record: &T) -> String {
    format!("{}/{}", T::KEY, record.record_id())
}
