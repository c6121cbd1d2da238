//! Application state management

use crate::config::AppConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::router::Router;
use crate::storage::LocalStorage;
use crate::store::MarketStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Database file inside the data directory
const DATABASE_FILE: &str = "cranepoint.db";

/// Application state shared across all commands
pub struct AppState {
    /// SQLite database (local storage table and settings)
    pub sqlite: Arc<SqliteDb>,

    /// Market data store persisted to local storage
    pub market: MarketStore,

    pub router: Router,

    pub config: AppConfig,

    /// Application data directory
    pub data_dir: PathBuf,
}

impl AppState {
    /// Create new application state rooted at `data_dir`
    pub fn new(data_dir: PathBuf, config: AppConfig, runtime: Handle) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&data_dir)?;

        tracing::info!("Data directory: {:?}", data_dir);

        let sqlite = Arc::new(
            SqliteDb::new(&data_dir.join(DATABASE_FILE))?.with_storage_quota(config.storage_quota),
        );

        let storage: Arc<dyn LocalStorage> = sqlite.clone();
        let market = MarketStore::open(storage, config.storage_key.clone(), config.write_delay, runtime);

        Ok(Self {
            sqlite,
            market,
            router: Router::new(),
            config,
            data_dir,
        })
    }

    /// Create application state from the Tauri app handle
    #[cfg(feature = "desktop")]
    pub fn from_app(app_handle: &tauri::AppHandle, config: AppConfig) -> Result<Self> {
        use crate::error::AppError;
        use tauri::Manager;

        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => app_handle
                .path()
                .app_data_dir()
                .map_err(|e| AppError::Config(format!("Failed to get app data directory: {}", e)))?,
        };

        let runtime = tauri::async_runtime::block_on(async { Handle::current() });

        Self::new(data_dir, config, runtime)
    }

    /// Finance report folder; relative settings resolve against the data directory
    pub fn finance_dir(&self) -> Result<PathBuf> {
        let configured = self.sqlite.get_settings()?.finance_dir;
        Ok(resolve_dir(&self.data_dir, &configured))
    }

    /// Persist anything still waiting in the write-back queue
    pub fn shutdown(&self) {
        tracing::info!("Flushing market store");
        self.market.flush();
    }
}

fn resolve_dir(base: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Stock;

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");

        {
            let state = AppState::new(data_dir.clone(), AppConfig::default(), Handle::current())
                .unwrap();
            assert!(state.market.state().stocks.is_empty());

            state.market.update_market_data(vec![Stock {
                code: "600000".to_string(),
                name: "SPDB".to_string(),
                price: 10.7,
                ..Default::default()
            }]);
            state.shutdown();
        }

        let state = AppState::new(data_dir, AppConfig::default(), Handle::current()).unwrap();
        let market = state.market.state();
        assert_eq!(market.stocks.len(), 1);
        assert_eq!(market.stocks[0].price, 10.7);
        assert!(market.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_finance_dir_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let state =
            AppState::new(dir.path().to_path_buf(), AppConfig::default(), Handle::current())
                .unwrap();

        assert_eq!(state.finance_dir().unwrap(), dir.path().join("finance_data"));

        let absolute = dir.path().join("reports");
        state
            .sqlite
            .update_settings(
                None,
                None,
                None,
                None,
                None,
                Some(absolute.to_string_lossy().into_owned()),
                None,
            )
            .unwrap();
        assert_eq!(state.finance_dir().unwrap(), absolute);
    }
}
