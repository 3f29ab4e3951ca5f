//! Durable local store for sites and inspection logs.
//!
//! Both collections live as whole JSON arrays under two named entries. Every
//! mutation is `read-full -> mutate -> write-full` under a per-collection
//! writer lock, and the lock is never held across a network call. Anything
//! that writes after a suspend point must re-read the collection first, which
//! is what [`LocalStore::mark_inspection_synced`] does.

mod backend;

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{seed_sites, InspectionLog, Site, SyncRecord};

pub use backend::{EntryBackend, LibSqlEntryBackend, MemoryEntryBackend};

/// Entry holding the JSON array of sites.
pub const SITES_KEY: &str = "sp_sites";
/// Entry holding the JSON array of inspection logs.
pub const INSPECTIONS_KEY: &str = "sp_inspections";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectionKind {
    Sites,
    Inspections,
}

/// A collection as read from its entry.
///
/// Array elements that do not decode as `T` keep their raw JSON and original
/// index and are written back on every rewrite.
pub(crate) struct Stored<T> {
    records: Vec<T>,
    unreadable: Vec<(usize, Value)>,
}

impl<T> Stored<T> {
    fn new(records: Vec<T>) -> Self {
        Self {
            records,
            unreadable: Vec::new(),
        }
    }
}

/// Outcome of decoding a stored collection payload.
pub(crate) struct Decoded<T> {
    stored: Stored<T>,
    /// Records should be written back before being handed out
    persist: bool,
}

/// Records stored as one named collection.
pub(crate) trait Collection: SyncRecord + Serialize + DeserializeOwned + Send + Sync {
    const KEY: &'static str;
    const KIND: CollectionKind;

    /// Decode a raw payload, recovering from corruption without failing.
    fn decode(raw: Option<&str>) -> Decoded<Self>;
}

impl Collection for Site {
    const KEY: &'static str = SITES_KEY;
    const KIND: CollectionKind = CollectionKind::Sites;

    fn decode(raw: Option<&str>) -> Decoded<Self> {
        let Some(raw) = raw else {
            return Decoded {
                stored: Stored::new(seed_sites()),
                persist: true,
            };
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Decoded {
                stored: decode_items(items, Self::KEY),
                persist: false,
            },
            Ok(_) => {
                tracing::warn!("Stored sites payload is not an array; using seed data");
                Decoded {
                    stored: Stored::new(seed_sites()),
                    persist: false,
                }
            }
            Err(error) => {
                tracing::warn!("Error parsing stored sites: {}", error);
                Decoded {
                    stored: Stored::new(seed_sites()),
                    persist: false,
                }
            }
        }
    }
}

impl Collection for InspectionLog {
    const KEY: &'static str = INSPECTIONS_KEY;
    const KIND: CollectionKind = CollectionKind::Inspections;

    fn decode(raw: Option<&str>) -> Decoded<Self> {
        let stored = match raw.map(serde_json::from_str::<Value>) {
            None => Stored::new(Vec::new()),
            Some(Ok(Value::Array(items))) => decode_items(items, Self::KEY),
            Some(Ok(value @ Value::Object(_))) if value.get("id").is_some() => {
                tracing::warn!("Stored inspections payload is a single object; wrapping it");
                decode_items(vec![value], Self::KEY)
            }
            Some(Ok(_)) => {
                tracing::warn!("Stored inspections payload is not an array; ignoring it");
                Stored::new(Vec::new())
            }
            Some(Err(error)) => {
                tracing::warn!("Error reading inspections: {}", error);
                Stored::new(Vec::new())
            }
        };

        Decoded {
            stored,
            persist: false,
        }
    }
}

/// Decode array items one by one so a single bad element does not hide the rest.
fn decode_items<T: DeserializeOwned>(items: Vec<Value>, key: &str) -> Stored<T> {
    let mut stored = Stored::new(Vec::with_capacity(items.len()));
    for (index, item) in items.into_iter().enumerate() {
        match <T as serde::Deserialize>::deserialize(&item) {
            Ok(record) => stored.records.push(record),
            Err(error) => {
                tracing::warn!("Keeping unreadable record {} in {} as is: {}", index, key, error);
                stored.unreadable.push((index, item));
            }
        }
    }
    stored
}

/// Result of confirming a remote upload against the fresh local collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The stored record matched the uploaded version and is now synced.
    Marked,
    /// The record was edited while the upload was in flight; it stays pending.
    Changed,
    /// The record no longer exists locally.
    Missing,
}

/// Local read/write contract consumed by the UI collaborators and the sync
/// engine.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn EntryBackend>,
    sites_lock: Arc<Mutex<()>>,
    inspections_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn EntryBackend>) -> Self {
        Self {
            backend,
            sites_lock: Arc::new(Mutex::new(())),
            inspections_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store backed by a durable libSQL file.
    pub async fn open_path(db_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let backend = LibSqlEntryBackend::open_path(db_path).await?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEntryBackend::new()))
    }

    fn lock(&self, kind: CollectionKind) -> &Mutex<()> {
        match kind {
            CollectionKind::Sites => &self.sites_lock,
            CollectionKind::Inspections => &self.inspections_lock,
        }
    }

    /// All sites in walk-configuration order. Seeds the demo site on first
    /// access.
    pub async fn get_sites(&self) -> Result<Vec<Site>> {
        let _guard = self.lock(CollectionKind::Sites).lock().await;
        Ok(self.load::<Site>().await?.records)
    }

    /// All inspection logs in insertion order.
    pub async fn get_inspections(&self) -> Result<Vec<InspectionLog>> {
        let _guard = self.lock(CollectionKind::Inspections).lock().await;
        Ok(self.load::<InspectionLog>().await?.records)
    }

    /// Site by identifier.
    pub async fn get_site(&self, id: &str) -> Result<Option<Site>> {
        Ok(self.get_sites().await?.into_iter().find(|site| site.id == id))
    }

    /// Inspection log by identifier.
    pub async fn get_inspection(&self, id: &str) -> Result<Option<InspectionLog>> {
        Ok(self
            .get_inspections()
            .await?
            .into_iter()
            .find(|log| log.id == id))
    }

    /// Upsert a site locally, marking it unsynced. Returns the stored version.
    pub async fn put_site(&self, site: Site) -> Result<Site> {
        self.upsert(site).await
    }

    /// Upsert an inspection log locally, marking it unsynced. The write has
    /// completed when this returns.
    pub async fn put_inspection(&self, log: InspectionLog) -> Result<InspectionLog> {
        self.upsert(log).await
    }

    /// Remove a site locally. Returns whether a site was removed.
    pub async fn remove_site(&self, id: &str) -> Result<bool> {
        let _guard = self.lock(CollectionKind::Sites).lock().await;
        let mut sites = self.load::<Site>().await?;
        let before = sites.records.len();
        sites.records.retain(|site| site.id != id);
        let removed = sites.records.len() != before;
        self.write(&sites).await?;
        Ok(removed)
    }

    /// Sites not yet confirmed remotely.
    pub async fn pending_sites(&self) -> Result<Vec<Site>> {
        Ok(pending(self.get_sites().await?))
    }

    /// Inspection logs not yet confirmed remotely.
    pub async fn pending_inspections(&self) -> Result<Vec<InspectionLog>> {
        Ok(pending(self.get_inspections().await?))
    }

    /// Flip `synced` on the stored copy of an uploaded site.
    pub async fn mark_site_synced(&self, uploaded: &Site) -> Result<MarkOutcome> {
        self.mark_synced(uploaded).await
    }

    /// Flip `synced` on the stored copy of an uploaded inspection log.
    pub async fn mark_inspection_synced(&self, uploaded: &InspectionLog) -> Result<MarkOutcome> {
        self.mark_synced(uploaded).await
    }

    /// Append remote sites unknown locally, marked as synced.
    ///
    /// Existing local sites are never touched and ids in `excluded` are never
    /// added. Returns the number of appended sites.
    pub async fn append_remote_sites(
        &self,
        remote: Vec<Site>,
        excluded: &HashSet<String>,
    ) -> Result<usize> {
        let _guard = self.lock(CollectionKind::Sites).lock().await;
        let mut sites = self.load::<Site>().await?;
        let mut known = sites
            .records
            .iter()
            .map(|site| site.id.clone())
            .collect::<HashSet<_>>();

        let mut appended = 0usize;
        for mut site in remote {
            if excluded.contains(&site.id) || !known.insert(site.id.clone()) {
                continue;
            }
            site.set_synced(true);
            sites.records.push(site);
            appended += 1;
        }

        if appended > 0 {
            self.write(&sites).await?;
        }
        Ok(appended)
    }

    pub(crate) async fn upsert<T: Collection>(&self, mut record: T) -> Result<T> {
        record.set_synced(false);

        let _guard = self.lock(T::KIND).lock().await;
        let mut records = self.load::<T>().await?;
        match records
            .records
            .iter()
            .position(|existing| existing.record_id() == record.record_id())
        {
            Some(index) => records.records[index] = record.clone(),
            None => records.records.push(record.clone()),
        }
        self.write(&records).await?;

        tracing::debug!("Saved {} locally in {}", record.record_id(), T::KEY);
        Ok(record)
    }

    /// Re-read the collection and flip `synced` only if the stored record is
    /// still the version that was uploaded.
    pub(crate) async fn mark_synced<T: Collection>(&self, uploaded: &T) -> Result<MarkOutcome> {
        let _guard = self.lock(T::KIND).lock().await;
        let mut records = self.load::<T>().await?;
        let Some(current) = records
            .records
            .iter_mut()
            .find(|record| record.record_id() == uploaded.record_id())
        else {
            return Ok(MarkOutcome::Missing);
        };

        if !current.same_content(uploaded) {
            tracing::debug!(
                "{} changed during upload; leaving it pending",
                uploaded.record_id()
            );
            return Ok(MarkOutcome::Changed);
        }

        current.set_synced(true);
        self.write(&records).await?;
        Ok(MarkOutcome::Marked)
    }

    /// Callers must hold the collection lock.
    async fn load<T: Collection>(&self) -> Result<Stored<T>> {
        let raw = self.backend.read_entry(T::KEY).await?;
        let decoded = T::decode(raw.as_deref());
        if decoded.persist {
            tracing::info!("Seeding {}", T::KEY);
            self.write(&decoded.stored).await?;
        }
        Ok(decoded.stored)
    }

    /// Callers must hold the collection lock.
    async fn write<T: Collection>(&self, stored: &Stored<T>) -> Result<()> {
        let mut items = stored
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        for (index, item) in &stored.unreadable {
            items.insert((*index).min(items.len()), item.clone());
        }
        let payload = serde_json::to_string(&items)?;
        self.backend.write_entry(T::KEY, &payload).await
    }
}

fn pending<T: SyncRecord>(records: Vec<T>) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| !record.is_synced())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, InspectionStatus};
    use pretty_assertions::assert_eq;

    fn sample_log(id: &str) -> InspectionLog {
        InspectionLog {
            id: id.to_string(),
            site_id: "site-1".to_string(),
            site_name: "Cantera Los Álamos (Demo)".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            inspector_name: "Ana".to_string(),
            inspector_dni: "12345678A".to_string(),
            inspector_email: "ana@example.com".to_string(),
            answers: vec![Answer {
                point_id: "pt-1".to_string(),
                point_name: "Extintor Principal".to_string(),
                question: "¿El extintor está cargado?".to_string(),
                area_name: "Caseta de Control".to_string(),
                is_ok: true,
                photo_url: Some("data:image/jpeg;base64,AAAA".to_string()),
                timestamp: 1_714_557_600_000,
            }],
            status: InspectionStatus::Completed,
            synced: None,
        }
    }

    fn store_with(entries: &[(&str, &str)]) -> (LocalStore, Arc<MemoryEntryBackend>) {
        let backend = Arc::new(MemoryEntryBackend::with_entries(
            entries.iter().map(|(key, value)| (*key, *value)),
        ));
        (LocalStore::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn first_access_seeds_and_persists_sites() {
        let (store, backend) = store_with(&[]);

        let sites = store.get_sites().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "Cantera Los Álamos (Demo)");
        assert_eq!(sites[0].areas.len(), 1);
        assert_eq!(sites[0].areas[0].points.len(), 1);

        assert!(backend.read_entry(SITES_KEY).await.unwrap().is_some());

        let mut edited = sites[0].clone();
        edited.name = "Cantera Norte".to_string();
        store.put_site(edited).await.unwrap();

        let again = store.get_sites().await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name, "Cantera Norte");
    }

    #[tokio::test]
    async fn corrupt_sites_fall_back_to_seed() {
        let (store, _) = store_with(&[(SITES_KEY, "{not json")]);
        let sites = store.get_sites().await.unwrap();
        assert_eq!(sites, seed_sites());

        let (store, _) = store_with(&[(SITES_KEY, "{\"id\":\"x\"}")]);
        assert_eq!(store.get_sites().await.unwrap(), seed_sites());
    }

    #[tokio::test]
    async fn corrupt_inspections_read_as_empty() {
        let (store, _) = store_with(&[(INSPECTIONS_KEY, "\"not-an-array\"")]);
        assert!(store.get_inspections().await.unwrap().is_empty());

        let (store, _) = store_with(&[(INSPECTIONS_KEY, "not-an-array")]);
        assert!(store.get_inspections().await.unwrap().is_empty());

        let (store, _) = store_with(&[]);
        assert!(store.get_inspections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_inspection_object_is_wrapped() {
        let raw = serde_json::to_string(&sample_log("log-1")).unwrap();
        let (store, _) = store_with(&[(INSPECTIONS_KEY, raw.as_str())]);

        let logs = store.get_inspections().await.unwrap();
        assert_eq!(logs, vec![sample_log("log-1")]);
    }

    #[tokio::test]
    async fn unreadable_array_items_are_skipped() {
        let good = serde_json::to_string(&sample_log("log-1")).unwrap();
        let raw = format!("[{good}, 42, {{\"id\":\"broken\"}}]");
        let (store, _) = store_with(&[(INSPECTIONS_KEY, raw.as_str())]);

        let logs = store.get_inspections().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, "log-1");
    }

    #[tokio::test]
    async fn unreadable_items_survive_rewrites() {
        let mut legacy = serde_json::to_value(sample_log("legacy-1")).unwrap();
        legacy.as_object_mut().unwrap().remove("inspectorEmail");
        let raw = serde_json::to_string(&vec![
            legacy.clone(),
            serde_json::to_value(sample_log("log-1")).unwrap(),
        ])
        .unwrap();
        let (store, backend) = store_with(&[(INSPECTIONS_KEY, raw.as_str())]);

        store.put_inspection(sample_log("new-1")).await.unwrap();
        let current = store.get_inspection("log-1").await.unwrap().unwrap();
        store.mark_inspection_synced(&current).await.unwrap();

        let stored = backend.read_entry(INSPECTIONS_KEY).await.unwrap().unwrap();
        let items = serde_json::from_str::<Vec<Value>>(&stored).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], legacy);
        assert_eq!(items[1]["id"], "log-1");
        assert_eq!(items[1]["synced"], true);
        assert_eq!(items[2]["id"], "new-1");

        let ids = store
            .get_inspections()
            .await
            .unwrap()
            .into_iter()
            .map(|log| log.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["log-1", "new-1"]);
    }

    #[tokio::test]
    async fn unreadable_site_survives_removal_of_another() {
        let seed = serde_json::to_value(seed_sites().remove(0)).unwrap();
        let broken = serde_json::json!({ "id": "site-old", "name": 7 });
        let raw = serde_json::to_string(&vec![seed, broken.clone()]).unwrap();
        let (store, backend) = store_with(&[(SITES_KEY, raw.as_str())]);

        assert!(store.remove_site("site-1").await.unwrap());

        let stored = backend.read_entry(SITES_KEY).await.unwrap().unwrap();
        let items = serde_json::from_str::<Vec<Value>>(&stored).unwrap();
        assert_eq!(items, vec![broken]);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place_and_resets_synced() {
        let store = LocalStore::in_memory();
        let mut first = sample_log("log-1");
        first.synced = Some(true);
        store.put_inspection(first).await.unwrap();
        store.put_inspection(sample_log("log-2")).await.unwrap();

        let mut replacement = sample_log("log-1");
        replacement.answers[0].is_ok = false;
        store.put_inspection(replacement).await.unwrap();

        let logs = store.get_inspections().await.unwrap();
        let ids = logs.iter().map(|log| log.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["log-1", "log-2"]);
        assert!(!logs[0].answers[0].is_ok);
        assert_eq!(logs[0].synced, Some(false));
    }

    #[tokio::test]
    async fn mark_synced_requires_unchanged_record() {
        let store = LocalStore::in_memory();
        let uploaded = store.put_inspection(sample_log("log-1")).await.unwrap();

        let mut edited = sample_log("log-1");
        edited.inspector_name = "Luis".to_string();
        store.put_inspection(edited).await.unwrap();

        assert_eq!(
            store.mark_inspection_synced(&uploaded).await.unwrap(),
            MarkOutcome::Changed
        );
        assert_eq!(store.pending_inspections().await.unwrap().len(), 1);

        let current = store.get_inspection("log-1").await.unwrap().unwrap();
        assert_eq!(
            store.mark_inspection_synced(&current).await.unwrap(),
            MarkOutcome::Marked
        );
        assert!(store.pending_inspections().await.unwrap().is_empty());

        assert_eq!(
            store
                .mark_inspection_synced(&sample_log("ghost"))
                .await
                .unwrap(),
            MarkOutcome::Missing
        );
    }

    #[tokio::test]
    async fn remove_site_preserves_order_of_others() {
        let store = LocalStore::in_memory();
        let mut second = seed_sites().remove(0);
        second.id = "site-2".to_string();
        let mut third = second.clone();
        third.id = "site-3".to_string();
        store.put_site(second).await.unwrap();
        store.put_site(third).await.unwrap();

        assert!(store.remove_site("site-2").await.unwrap());
        assert!(!store.remove_site("site-2").await.unwrap());

        let ids = store
            .get_sites()
            .await
            .unwrap()
            .into_iter()
            .map(|site| site.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["site-1", "site-3"]);
    }

    #[tokio::test]
    async fn append_remote_sites_is_additive() {
        let store = LocalStore::in_memory();
        let local = store.get_sites().await.unwrap();

        let mut remote_copy = local[0].clone();
        remote_copy.name = "Remote rename".to_string();
        let mut new_site = local[0].clone();
        new_site.id = "site-9".to_string();
        let mut deleted = local[0].clone();
        deleted.id = "site-gone".to_string();

        let excluded = HashSet::from(["site-gone".to_string()]);
        let appended = store
            .append_remote_sites(vec![remote_copy, new_site, deleted], &excluded)
            .await
            .unwrap();
        assert_eq!(appended, 1);

        let sites = store.get_sites().await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name, "Cantera Los Álamos (Demo)");
        assert_eq!(sites[1].id, "site-9");
        assert!(sites[1].is_synced());
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let (store, backend) = store_with(&[]);
        backend.set_fail_writes(true);
        assert!(store.put_inspection(sample_log("log-1")).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn area_and_point_order_survives_libsql_roundtrip() {
        let backend = LibSqlEntryBackend::open_in_memory().await.unwrap();
        let store = LocalStore::new(Arc::new(backend));

        let mut site = seed_sites().remove(0);
        site.id = "ordered".to_string();
        let mut area_b = site.areas[0].clone();
        area_b.id = "area-b".to_string();
        area_b.name = "Zona B".to_string();
        let mut extra_point = area_b.points[0].clone();
        extra_point.id = "pt-b2".to_string();
        area_b.points[0].id = "pt-b1".to_string();
        area_b.points.push(extra_point);
        site.areas.insert(0, area_b);
        store.put_site(site.clone()).await.unwrap();

        let stored = store.get_site("ordered").await.unwrap().unwrap();
        let area_ids = stored.areas.iter().map(|a| a.id.as_str()).collect::<Vec<_>>();
        assert_eq!(area_ids, vec!["area-b", "area-1"]);
        let point_ids = stored.areas[0]
            .points
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(point_ids, vec!["pt-b1", "pt-b2"]);
    }
}
