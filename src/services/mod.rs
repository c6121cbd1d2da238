//! Services Layer
//!
//! Business logic called by the Tauri commands. Services take the state they
//! need explicitly so they can run headless in tests.
//!
//! # Services
//!
//! - `MarketRefreshService` - sharded market listing fetch into the store
//! - `FinanceFilesService` - finance report downloads and their folders

pub mod market_refresh_service;
pub mod finance_files_service;

// Re-export commonly used types and services
pub use market_refresh_service::{MarketRefreshService, ProgressSink, RefreshOptions, RefreshResult};
pub use finance_files_service::{
    DownloadOptions, DownloadRequest, DownloadSink, DownloadedItem, FinanceFilesService,
};
