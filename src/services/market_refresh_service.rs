//! Market Refresh Service
//!
//! Pulls the full A-share listing by running the fetch script once per
//! shard (one page of the upstream listing), a bounded number at a time,
//! and replaces the market store with the combined result.
//!
//! The script reports on stdout: `PROGRESS: <0-100>` lines while it works,
//! then a single JSON array line with the shard's records.

use crate::db::sqlite::models::{Settings, MAX_TOTAL_SHARDS};
use crate::error::{AppError, Result};
use crate::store::{MarketStore, Stock};
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Receives the aggregated refresh progress (0-100)
pub trait ProgressSink: Send + Sync {
    fn progress(&self, percent: u32);
}

/// How the fetch script is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOptions {
    pub python_path: String,
    pub script: String,
    pub shard_size: u32,
    pub total_shards: u32,
    pub max_concurrent: u32,
}

impl From<&Settings> for RefreshOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            python_path: settings.python_path.clone(),
            script: settings.fetch_script.clone(),
            shard_size: settings.shard_size,
            total_shards: settings.total_shards,
            max_concurrent: settings.max_concurrent_shards,
        }
    }
}

/// Outcome of a refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResult {
    pub success: bool,
    pub succeeded: u32,
    pub total_shards: u32,
    pub records: usize,
    pub last_updated: Option<i64>,
}

/// One line of script output
#[derive(Debug, PartialEq)]
enum ShardLine<'a> {
    Progress(u32),
    Payload(&'a str),
    Other,
}

fn classify_line(line: &str) -> ShardLine<'_> {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix("PROGRESS:") {
        return match rest.trim().parse::<u32>() {
            Ok(p) => ShardLine::Progress(p.min(100)),
            Err(_) => ShardLine::Other,
        };
    }

    // Only lines opening a JSON array carry data
    if trimmed.starts_with('[') {
        return ShardLine::Payload(trimmed);
    }

    ShardLine::Other
}

/// Per-shard progress averaged over all shards
struct ProgressTracker {
    shards: Mutex<HashMap<u32, u32>>,
    total: u32,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    fn new(total: u32, sink: Arc<dyn ProgressSink>) -> Self {
        let shards = (1..=total).map(|page| (page, 0)).collect();
        Self {
            shards: Mutex::new(shards),
            total,
            sink,
        }
    }

    fn update(&self, page: u32, percent: u32) {
        let mut shards = self.shards.lock();
        shards.insert(page, percent);

        let sum: u64 = shards.values().map(|&p| u64::from(p)).sum();
        let average = sum / u64::from(self.total.max(1));
        // Emit under the lock so listeners see averages in order
        self.sink.progress(average.min(100) as u32);
    }
}

/// Market refresh service for business logic
pub struct MarketRefreshService;

impl MarketRefreshService {
    /// Fetch every shard and replace the store contents with the result
    ///
    /// The store is left untouched when no shard succeeds.
    pub async fn refresh(
        store: &MarketStore,
        options: &RefreshOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RefreshResult> {
        info!(
            "MarketRefreshService::refresh - {} shards of {}",
            options.total_shards, options.shard_size
        );

        let (stocks, succeeded) = Self::fetch_all(options, Arc::clone(&sink)).await?;

        info!(
            "Fetched {}/{} shards, {} records in total",
            succeeded,
            options.total_shards,
            stocks.len()
        );

        if succeeded == 0 {
            return Err(AppError::Process(format!(
                "All {} shards failed",
                options.total_shards
            )));
        }

        let records = stocks.len();
        let state = store.update_market_data(stocks);

        Ok(RefreshResult {
            success: true,
            succeeded,
            total_shards: options.total_shards,
            records,
            last_updated: state.last_updated,
        })
    }

    /// Run all shards with bounded concurrency; records come back in shard order
    pub async fn fetch_all(
        options: &RefreshOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(Vec<Stock>, u32)> {
        if options.total_shards == 0 || options.max_concurrent == 0 {
            return Err(AppError::Validation(
                "total_shards and max_concurrent must be positive".to_string(),
            ));
        }
        if options.total_shards > MAX_TOTAL_SHARDS {
            return Err(AppError::Validation(format!(
                "total_shards must be at most {}, got {}",
                MAX_TOTAL_SHARDS, options.total_shards
            )));
        }

        let tracker = Arc::new(ProgressTracker::new(options.total_shards, Arc::clone(&sink)));
        let semaphore = Arc::new(Semaphore::new(options.max_concurrent as usize));

        let tasks: Vec<_> = (1..=options.total_shards)
            .map(|page| {
                let options = options.clone();
                let tracker = Arc::clone(&tracker);
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Internal(e.to_string()))?;
                    Self::fetch_shard(page, &options, &tracker).await
                })
            })
            .collect();

        let mut all = Vec::new();
        let mut succeeded = 0;

        for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
            let page = index + 1;
            match joined {
                Ok(Ok(stocks)) => {
                    all.extend(stocks);
                    succeeded += 1;
                }
                Ok(Err(e)) => warn!("Shard {} failed: {}", page, e),
                Err(e) => warn!("Shard {} task failed: {}", page, e),
            }
        }

        sink.progress(100);
        Ok((all, succeeded))
    }

    async fn fetch_shard(
        page: u32,
        options: &RefreshOptions,
        tracker: &ProgressTracker,
    ) -> Result<Vec<Stock>> {
        let mut child = Command::new(&options.python_path)
            .arg(&options.script)
            .arg("--page")
            .arg(page.to_string())
            .arg("--size")
            .arg(options.shard_size.to_string())
            .env("PYTHONIOENCODING", "utf-8")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Process(format!("Failed to start shard {}: {}", page, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Process("Failed to open stdout".to_string()))?;

        // Drain stderr so a chatty script cannot block on a full pipe
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("shard {} stderr: {}", page, line);
                }
            });
        }

        let mut lines = BufReader::new(stdout).lines();
        let mut payload: Option<String> = None;

        while let Some(line) = lines.next_line().await? {
            match classify_line(&line) {
                ShardLine::Progress(p) => tracker.update(page, p),
                ShardLine::Payload(json) => payload = Some(json.to_string()),
                ShardLine::Other => {}
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!("Shard {} exited with {:?}", page, status.code());
        }

        let payload = payload
            .ok_or_else(|| AppError::Process(format!("Shard {} produced no data", page)))?;

        let stocks: Vec<Stock> = serde_json::from_str(&payload)
            .map_err(|e| AppError::Process(format!("Failed to parse shard {}: {}", page, e)))?;

        Ok(stocks)
    }
}
