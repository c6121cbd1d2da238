//! Market data commands

use crate::error::Result;
use crate::services::{MarketRefreshService, ProgressSink, RefreshOptions, RefreshResult};
use crate::state::AppState;
use crate::store::{MarketState, Stock};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};

/// Forwards refresh progress to the frontend as `refresh-progress` events
struct EventProgress {
    app_handle: AppHandle,
}

impl ProgressSink for EventProgress {
    fn progress(&self, percent: u32) {
        if let Err(e) = self.app_handle.emit("refresh-progress", percent) {
            tracing::warn!("Failed to emit refresh progress: {}", e);
        }
    }
}

/// Get the current market state
#[tauri::command]
pub async fn get_market_state(state: State<'_, AppState>) -> Result<MarketState> {
    Ok(state.market.state().as_ref().clone())
}

/// Replace all stocks in the market store
#[tauri::command]
pub async fn update_market_data(
    state: State<'_, AppState>,
    stocks: Vec<Stock>,
) -> Result<Option<i64>> {
    tracing::info!("Updating market data: {} stocks", stocks.len());
    Ok(state.market.update_market_data(stocks).last_updated)
}

/// Fetch the full listing and load it into the market store
#[tauri::command]
pub async fn refresh_market_data(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<RefreshResult> {
    let settings = state.sqlite.get_settings()?;
    let options = RefreshOptions::from(&settings);
    let sink = Arc::new(EventProgress { app_handle: app });

    MarketRefreshService::refresh(&state.market, &options, sink).await
}
