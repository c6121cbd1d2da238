//! SQLite database models

use serde::{Deserialize, Serialize};

/// Upper bound on shards per refresh (65 covers the whole A-share listing)
pub const MAX_TOTAL_SHARDS: u32 = 200;

/// Application settings edited from the Settings view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub id: i64,
    /// Interpreter used to run the fetch scripts
    pub python_path: String,
    /// Script producing one shard of the market listing
    pub fetch_script: String,
    /// Records per shard (upstream API caps a page at 100)
    pub shard_size: u32,
    pub total_shards: u32,
    pub max_concurrent_shards: u32,
    /// Root folder of downloaded finance reports
    pub finance_dir: String,
    /// Script downloading finance report PDFs for one symbol
    pub finance_script: String,
    pub updated_at: String,
}
