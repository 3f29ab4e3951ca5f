//! Database layer for sitewalk

mod connection;
mod entries_repository;
mod migrations;

pub use connection::Database;
pub use entries_repository::LibSqlEntryRepository;
