//! Key/value table backing the market store

use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Get a stored value by key
pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM local_storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value)
}

/// Insert or replace a value, enforcing the byte quota if one is set
pub fn set_item(conn: &Connection, key: &str, value: &str, quota: Option<usize>) -> Result<()> {
    if let Some(limit) = quota {
        // Size of every other entry plus the incoming one
        let others: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM local_storage WHERE key != ?1",
            params![key],
            |row| row.get(0),
        )?;
        let needed = others as usize + key.len() + value.len();
        if needed > limit {
            return Err(AppError::Storage(format!(
                "quota exceeded: {} bytes needed, {} allowed",
                needed, limit
            )));
        }
    }

    conn.execute(
        "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;

    Ok(())
}

/// Remove a value by key
pub fn remove_item(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
    Ok(())
}
