//! sitewalk-core - Core library for sitewalk
//!
//! This crate contains the inspection models, the durable local store, the
//! remote store adapter, and the offline-first sync engine shared by every
//! sitewalk interface.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Answer, Area, InspectionLog, InspectionPoint, InspectionStatus, Site};
pub use state::SyncState;
pub use store::LocalStore;
pub use sync::{SyncEngine, SyncReport};
