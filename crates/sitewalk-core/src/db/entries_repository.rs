//! Named local entry repository

use crate::error::Result;
use crate::util::unix_timestamp_millis;
use libsql::Connection;

/// libSQL access to the `local_entries` table.
pub struct LibSqlEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Raw payload stored under `key`, if any.
    pub async fn get_entry(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM local_entries WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Replace the payload stored under `key` in a single statement.
    pub async fn set_entry(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO local_entries (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![key, value, unix_timestamp_millis()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_entry_is_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlEntryRepository::new(db.connection());
        assert_eq!(repo.get_entry("sp_sites").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_entry_replaces_previous_value() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlEntryRepository::new(db.connection());

        repo.set_entry("sp_sites", "[]").await.unwrap();
        repo.set_entry("sp_sites", "[1]").await.unwrap();

        assert_eq!(
            repo.get_entry("sp_sites").await.unwrap().as_deref(),
            Some("[1]")
        );
    }
}
