//! Settings management

use crate::db::sqlite::models::{Settings, MAX_TOTAL_SHARDS};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection};

/// Interpreter shipped in the project virtualenv
pub fn default_python_path() -> &'static str {
    if cfg!(windows) {
        "../.venv/Scripts/python.exe"
    } else {
        "../.venv/bin/python"
    }
}

/// Insert the settings row if it does not exist yet
pub fn ensure_default_settings(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO settings (id, python_path) VALUES (1, ?1)",
        params![default_python_path()],
    )?;
    Ok(())
}

/// Get settings
pub fn get_settings(conn: &Connection) -> Result<Settings> {
    let settings = conn.query_row(
        "SELECT id, python_path, fetch_script, shard_size, total_shards, max_concurrent_shards,
                finance_dir, finance_script, updated_at
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                id: row.get(0)?,
                python_path: row.get(1)?,
                fetch_script: row.get(2)?,
                shard_size: row.get(3)?,
                total_shards: row.get(4)?,
                max_concurrent_shards: row.get(5)?,
                finance_dir: row.get(6)?,
                finance_script: row.get(7)?,
                updated_at: row.get(8)?,
            })
        },
    )?;

    Ok(settings)
}

/// Update settings
#[allow(clippy::too_many_arguments)]
pub fn update_settings(
    conn: &Connection,
    python_path: Option<String>,
    fetch_script: Option<String>,
    shard_size: Option<u32>,
    total_shards: Option<u32>,
    max_concurrent_shards: Option<u32>,
    finance_dir: Option<String>,
    finance_script: Option<String>,
) -> Result<Settings> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(p) = python_path {
        updates.push("python_path = ?");
        params.push(Box::new(p));
    }
    if let Some(s) = fetch_script {
        updates.push("fetch_script = ?");
        params.push(Box::new(s));
    }
    if let Some(size) = shard_size {
        if !(1..=100).contains(&size) {
            return Err(AppError::Validation(format!(
                "shard_size must be between 1 and 100, got {}",
                size
            )));
        }
        updates.push("shard_size = ?");
        params.push(Box::new(size));
    }
    if let Some(total) = total_shards {
        if !(1..=MAX_TOTAL_SHARDS).contains(&total) {
            return Err(AppError::Validation(format!(
                "total_shards must be between 1 and {}, got {}",
                MAX_TOTAL_SHARDS, total
            )));
        }
        updates.push("total_shards = ?");
        params.push(Box::new(total));
    }
    if let Some(limit) = max_concurrent_shards {
        if limit == 0 {
            return Err(AppError::Validation(
                "max_concurrent_shards must be positive".to_string(),
            ));
        }
        updates.push("max_concurrent_shards = ?");
        params.push(Box::new(limit));
    }
    if let Some(dir) = finance_dir {
        updates.push("finance_dir = ?");
        params.push(Box::new(dir));
    }
    if let Some(script) = finance_script {
        updates.push("finance_script = ?");
        params.push(Box::new(script));
    }

    if !updates.is_empty() {
        let updated_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        updates.push("updated_at = ?");
        params.push(Box::new(updated_at));

        let sql = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_settings(conn)
}
