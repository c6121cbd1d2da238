//! Finance report commands

use crate::error::Result;
use crate::services::{
    DownloadOptions, DownloadRequest, DownloadSink, DownloadedItem, FinanceFilesService,
};
use crate::state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};

/// Forwards download output as `download-progress` / `download-status` events
struct DownloadEvents {
    app_handle: AppHandle,
}

impl DownloadSink for DownloadEvents {
    fn progress(&self, percent: u32) {
        if let Err(e) = self.app_handle.emit("download-progress", percent) {
            tracing::warn!("Failed to emit download progress: {}", e);
        }
    }

    fn status(&self, message: &str) {
        if let Err(e) = self.app_handle.emit("download-status", message) {
            tracing::warn!("Failed to emit download status: {}", e);
        }
    }
}

fn target_dir(state: &AppState, path: Option<String>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(PathBuf::from(p)),
        None => state.finance_dir(),
    }
}

/// Download finance reports for one security
#[tauri::command]
pub async fn download_finance_data(
    app: AppHandle,
    state: State<'_, AppState>,
    symbol: String,
    years: String,
    types: String,
    path: Option<String>,
) -> Result<String> {
    let settings = state.sqlite.get_settings()?;
    let options = DownloadOptions::from(&settings);
    let request = DownloadRequest {
        symbol,
        years,
        types,
        path: target_dir(&state, path)?,
    };
    let sink = Arc::new(DownloadEvents { app_handle: app });

    FinanceFilesService::download(&options, &request, sink).await
}

/// List downloaded report folders, newest first
#[tauri::command]
pub async fn list_downloaded_finance(
    state: State<'_, AppState>,
    path: Option<String>,
) -> Result<Vec<DownloadedItem>> {
    let dir = target_dir(&state, path)?;
    FinanceFilesService::list_downloaded(&dir)
}

/// Open a folder in the system file manager
#[tauri::command]
pub async fn open_folder(state: State<'_, AppState>, path: Option<String>) -> Result<()> {
    let dir = target_dir(&state, path)?;
    FinanceFilesService::open_folder(&dir)
}
