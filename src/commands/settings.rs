//! Settings management commands

use crate::db::sqlite::models::Settings;
use crate::error::Result;
use crate::state::AppState;
use serde::Deserialize;
use tauri::State;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub python_path: Option<String>,
    pub fetch_script: Option<String>,
    pub shard_size: Option<u32>,
    pub total_shards: Option<u32>,
    pub max_concurrent_shards: Option<u32>,
    pub finance_dir: Option<String>,
    pub finance_script: Option<String>,
}

/// Get current settings
#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<Settings> {
    state.sqlite.get_settings()
}

/// Update settings
#[tauri::command]
pub async fn update_settings(
    state: State<'_, AppState>,
    request: UpdateSettingsRequest,
) -> Result<Settings> {
    tracing::info!("Updating settings");

    state.sqlite.update_settings(
        request.python_path,
        request.fetch_script,
        request.shard_size,
        request.total_shards,
        request.max_concurrent_shards,
        request.finance_dir,
        request.finance_script,
    )
}
