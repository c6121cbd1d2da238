//! Cranepoint - A-share market data desktop viewer
//!
//! The Rust core behind the desktop shell: a market data store mirrored
//! into local storage with debounced writes, the view route table, and
//! the services the frontend invokes over IPC.

#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod router;
pub mod services;
pub mod state;
pub mod storage;
pub mod store;

use crate::config::DEFAULT_LOG_FILTER;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Initialize and run the Tauri application
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use crate::config::AppConfig;
    use crate::state::AppState;
    use tauri::Manager;

    init_tracing();

    tracing::info!("Starting Cranepoint...");

    let config = AppConfig::from_env();

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .setup(move |app| {
            // Initialize application state
            let app_state = AppState::from_app(app.handle(), config.clone())?;
            app.manage(app_state);

            tracing::info!("Application state initialized");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Market commands
            commands::market::get_market_state,
            commands::market::update_market_data,
            commands::market::refresh_market_data,
            // Route commands
            commands::routes::get_routes,
            commands::routes::resolve_route,
            // Finance report commands
            commands::finance::download_finance_data,
            commands::finance::list_downloaded_finance,
            commands::finance::open_folder,
            // Settings commands
            commands::settings::get_settings,
            commands::settings::update_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                if let Some(state) = app.try_state::<AppState>() {
                    state.shutdown();
                }
            }
        });
}
