//! Data models for sitewalk

mod inspection;
mod site;

pub use inspection::{Answer, InspectionLog, InspectionStatus};
pub use site::{seed_sites, Area, InspectionPoint, Site};

/// A record held in one of the local collections and mirrored remotely.
///
/// `synced` is tri-state on the wire; absent and `false` are equivalent.
pub trait SyncRecord: Clone + PartialEq {
    /// Stable identifier, unique within the record's collection.
    fn record_id(&self) -> &str;

    /// Raw synced marker as stored.
    fn synced_flag(&self) -> Option<bool>;

    /// Overwrite the synced marker.
    fn set_synced(&mut self, synced: bool);

    /// Whether the remote store has confirmed this exact version.
    fn is_synced(&self) -> bool {
        self.synced_flag().unwrap_or(false)
    }

    /// Compare two versions of a record ignoring the synced marker.
    fn same_content(&self, other: &Self) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        left.set_synced(false);
        right.set_synced(false);
        left == right
    }
}
