//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_local_storage", CREATE_LOCAL_STORAGE_TABLE)?;
    run_migration(conn, "002_settings", CREATE_SETTINGS_TABLE)?;
    run_migration(conn, "003_settings_finance_script", ADD_FINANCE_SCRIPT)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_LOCAL_STORAGE_TABLE: &str = r#"
CREATE TABLE local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    python_path TEXT NOT NULL,
    fetch_script TEXT NOT NULL DEFAULT 'lib/data_fetching.py',
    shard_size INTEGER NOT NULL DEFAULT 100,
    total_shards INTEGER NOT NULL DEFAULT 65,
    max_concurrent_shards INTEGER NOT NULL DEFAULT 10,
    finance_dir TEXT NOT NULL DEFAULT 'finance_data',
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const ADD_FINANCE_SCRIPT: &str = r#"
ALTER TABLE settings ADD COLUMN finance_script TEXT NOT NULL DEFAULT '../lib/finance_fetching.py';
"#;
