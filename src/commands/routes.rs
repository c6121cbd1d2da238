//! Routing commands

use crate::error::{AppError, Result};
use crate::router::RouteRecord;
use crate::state::AppState;
use tauri::State;

/// All application routes
#[tauri::command]
pub async fn get_routes(state: State<'_, AppState>) -> Result<Vec<RouteRecord>> {
    Ok(state.router.routes())
}

/// Resolve a location to its route
#[tauri::command]
pub async fn resolve_route(state: State<'_, AppState>, path: String) -> Result<RouteRecord> {
    state
        .router
        .resolve(&path)
        .map(RouteRecord::from)
        .ok_or_else(|| AppError::NotFound(format!("No route for {}", path)))
}
