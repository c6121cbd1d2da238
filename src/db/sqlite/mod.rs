//! SQLite database module

pub mod models;
mod migrations;
mod local_storage;
mod settings;

use crate::error::Result;
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
    /// Byte quota for the local storage table
    storage_quota: Option<usize>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            storage_quota: None,
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Limit the total size of the local storage table
    pub fn with_storage_quota(mut self, quota: Option<usize>) -> Self {
        self.storage_quota = quota;
        self
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)?;
        settings::ensure_default_settings(&conn)
    }

    // ========== Local Storage Methods ==========

    /// Get a local storage value
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        local_storage::get_item(&conn, key)
    }

    /// Set a local storage value
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        local_storage::set_item(&conn, key, value, self.storage_quota)
    }

    /// Remove a local storage value
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        local_storage::remove_item(&conn, key)
    }

    // ========== Settings Methods ==========

    /// Get settings
    pub fn get_settings(&self) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::get_settings(&conn)
    }

    /// Update settings
    #[allow(clippy::too_many_arguments)]
    pub fn update_settings(
        &self,
        python_path: Option<String>,
        fetch_script: Option<String>,
        shard_size: Option<u32>,
        total_shards: Option<u32>,
        max_concurrent_shards: Option<u32>,
        finance_dir: Option<String>,
        finance_script: Option<String>,
    ) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::update_settings(
            &conn,
            python_path,
            fetch_script,
            shard_size,
            total_shards,
            max_concurrent_shards,
            finance_dir,
            finance_script,
        )
    }
}
