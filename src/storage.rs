//! Local storage abstraction
//!
//! String values addressed by string keys, mirroring the browser's
//! `localStorage`. The market store only ever talks to this trait, so the
//! durable SQLite table and the in-memory map are interchangeable.

use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Durable key/value storage of string values
pub trait LocalStorage: Send + Sync {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value under `key`
    fn remove_item(&self, key: &str) -> Result<()>;
}

impl LocalStorage for SqliteDb {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        SqliteDb::get_item(self, key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        SqliteDb::set_item(self, key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        SqliteDb::remove_item(self, key)
    }
}

/// In-memory storage, optionally bounded by a byte quota
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total size past `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Number of successful `set_item` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock();

        if let Some(limit) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(AppError::Storage(format!(
                    "quota exceeded: {} bytes needed, {} allowed",
                    needed, limit
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}
