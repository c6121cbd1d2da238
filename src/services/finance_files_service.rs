//! Finance Files Service
//!
//! Downloads finance reports through the report script and browses the
//! folder they are written to: one subdirectory per security.
//!
//! The report script is run as
//! `<python> <script> --symbol S --years Y --types T --path P` and reports
//! with `PROGRESS: <0-100>`, `INFO: ...` / `ERROR: ...` and `SUCCESS: ...`
//! lines.

use crate::db::sqlite::models::Settings;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Result message when the script never reports one
const DEFAULT_DOWNLOAD_MESSAGE: &str = "Download finished";

/// Receives report download progress (0-100) and status lines
pub trait DownloadSink: Send + Sync {
    fn progress(&self, percent: u32);
    fn status(&self, message: &str);
}

/// How the report script is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub python_path: String,
    pub script: String,
}

impl From<&Settings> for DownloadOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            python_path: settings.python_path.clone(),
            script: settings.finance_script.clone(),
        }
    }
}

/// Which reports to download, and where to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Security code or name
    pub symbol: String,
    /// Comma separated years, e.g. `2023,2022`
    pub years: String,
    /// Comma separated report types
    pub types: String,
    pub path: PathBuf,
}

impl DownloadRequest {
    fn validate(&self) -> Result<()> {
        for (field, value) in [("symbol", &self.symbol), ("years", &self.years), ("types", &self.types)] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// One line of report script output
#[derive(Debug, PartialEq)]
enum ReportLine<'a> {
    Progress(u32),
    Status(&'a str),
    Success(&'a str),
    Other,
}

fn classify_report_line(line: &str) -> ReportLine<'_> {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix("PROGRESS:") {
        return match rest.trim().parse::<u32>() {
            Ok(p) => ReportLine::Progress(p.min(100)),
            Err(_) => ReportLine::Other,
        };
    }
    if trimmed.starts_with("INFO:") || trimmed.starts_with("ERROR:") {
        return ReportLine::Status(trimmed);
    }
    if let Some(rest) = trimmed.strip_prefix("SUCCESS:") {
        return ReportLine::Success(rest.trim());
    }

    ReportLine::Other
}

/// A downloaded report folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedItem {
    pub name: String,
    /// Last modification, epoch seconds
    pub updated_at: u64,
}

/// Finance files service for business logic
pub struct FinanceFilesService;

impl FinanceFilesService {
    /// Run the report script for one security
    ///
    /// Returns the last `SUCCESS:` message; a non-zero exit is an error.
    pub async fn download(
        options: &DownloadOptions,
        request: &DownloadRequest,
        sink: Arc<dyn DownloadSink>,
    ) -> Result<String> {
        request.validate()?;
        info!(
            "FinanceFilesService::download - {} years={} types={}",
            request.symbol, request.years, request.types
        );

        Self::ensure_folder(&request.path)?;

        let mut child = Command::new(&options.python_path)
            .arg(&options.script)
            .arg("--symbol")
            .arg(&request.symbol)
            .arg("--years")
            .arg(&request.years)
            .arg("--types")
            .arg(&request.types)
            .arg("--path")
            .arg(&request.path)
            .env("PYTHONIOENCODING", "utf-8")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Process(format!("Failed to start report download: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Process("Failed to open stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Process("Failed to open stderr".to_string()))?;

        // Both streams carry report lines; stderr wins for the final message
        let (from_stderr, from_stdout) = tokio::join!(
            Self::follow_report(stderr, sink.as_ref()),
            Self::follow_report(stdout, sink.as_ref()),
        );

        let status = child.wait().await?;
        if !status.success() {
            warn!("Report download exited with {:?}", status.code());
            return Err(AppError::Process(format!(
                "Report download failed (exit code {:?}); check the symbol and network connection",
                status.code()
            )));
        }

        let message = from_stderr
            .or(from_stdout)
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_MESSAGE.to_string());
        info!("Report download for {} finished: {}", request.symbol, message);
        Ok(message)
    }

    /// Forward report lines to the sink; yields the last success message
    async fn follow_report<R>(stream: R, sink: &dyn DownloadSink) -> Option<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(stream).lines();
        let mut last_success = None;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match classify_report_line(&line) {
                    ReportLine::Progress(p) => sink.progress(p),
                    ReportLine::Status(message) => sink.status(message),
                    ReportLine::Success(message) => last_success = Some(message.to_string()),
                    ReportLine::Other => debug!("report script: {}", line),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read report script output: {}", e);
                    break;
                }
            }
        }

        last_success
    }

    /// List report folders under `path`, most recently updated first
    pub fn list_downloaded(path: &Path) -> Result<Vec<DownloadedItem>> {
        let mut entries = Vec::new();

        if !path.exists() {
            return Ok(entries);
        }

        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let updated_at = entry
                .metadata()?
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map_err(|e| AppError::Internal(e.to_string()))?
                .as_secs();

            if let Some(name) = entry.file_name().to_str() {
                entries.push(DownloadedItem {
                    name: name.to_string(),
                    updated_at,
                });
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Create `path` if needed and reveal it in the system file manager
    pub fn open_folder(path: &Path) -> Result<()> {
        Self::ensure_folder(path)?;

        std::process::Command::new(Self::file_manager())
            .arg(path)
            .spawn()
            .map_err(|e| AppError::Process(format!("Failed to open {:?}: {}", path, e)))?;

        info!("Opened folder {:?}", path);
        Ok(())
    }

    fn ensure_folder(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Platform program used to show a folder
    pub fn file_manager() -> &'static str {
        if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}
