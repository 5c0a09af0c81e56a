use std::fs;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::RunConfig;
use crate::domain::PmcId;
use crate::error::PmcError;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::file_list::PathTable;
use crate::search::search_ids;
use crate::unpack::unpack_pdfs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
    pub severity: Severity,
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
            severity: Severity::Info,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
            severity: Severity::Warn,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
            severity: Severity::Info,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Drops every event. Used for JSON output and in tests.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards events to `tracing`.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        let elapsed_ms = event.elapsed.map(|elapsed| elapsed.as_millis() as u64);
        match (event.severity, elapsed_ms) {
            (Severity::Info, Some(elapsed_ms)) => tracing::info!(elapsed_ms, "{}", event.message),
            (Severity::Info, None) => tracing::info!("{}", event.message),
            (Severity::Warn, Some(elapsed_ms)) => tracing::warn!(elapsed_ms, "{}", event.message),
            (Severity::Warn, None) => tracing::warn!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemStatus {
    Extracted {
        moved: Vec<String>,
        conflicts: Vec<String>,
    },
    NoPdf,
    NotInFileList,
    InvalidId {
        message: String,
    },
    DownloadRejected {
        status: u16,
    },
    DownloadFailed {
        message: String,
    },
    UnpackFailed {
        message: String,
    },
}

impl ItemStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ItemStatus::InvalidId { .. }
                | ItemStatus::DownloadRejected { .. }
                | ItemStatus::DownloadFailed { .. }
                | ItemStatus::UnpackFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub url: Option<String>,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ids: usize,
    pub extracted: usize,
    pub pdfs: usize,
    pub conflicts: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub search_term: String,
    pub download_dir: String,
    pub items: Vec<ItemReport>,
    pub summary: RunSummary,
    pub finished_at: String,
}

impl RunReport {
    fn new(config: &RunConfig, items: Vec<ItemReport>) -> Self {
        let mut summary = RunSummary {
            ids: items.len(),
            ..RunSummary::default()
        };
        for item in &items {
            match &item.status {
                ItemStatus::Extracted { moved, conflicts } => {
                    summary.extracted += 1;
                    summary.pdfs += moved.len();
                    summary.conflicts += conflicts.len();
                }
                status if status.is_failure() => summary.failed += 1,
                _ => summary.skipped += 1,
            }
        }
        Self {
            search_term: config.search_term.clone(),
            download_dir: config.download_dir().to_string(),
            items,
            summary,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct App<F: Fetcher> {
    config: RunConfig,
    fetcher: F,
}

impl<F: Fetcher> App<F> {
    pub fn new(config: RunConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the configured search and returns the raw ids.
    pub fn search(&self, sink: &dyn ProgressSink) -> Result<Vec<String>, PmcError> {
        let query = self.config.query()?;
        search_ids(
            &self.fetcher,
            &self.config.search_url,
            &query,
            self.config.output_dir.as_std_path(),
            &self.config.result_file_name,
            sink,
        )
    }

    /// Search, then download and unpack every hit, one after another.
    ///
    /// Only the search itself can fail the run; per-id problems end up in the
    /// returned report.
    pub fn run(&self, table: &PathTable, sink: &dyn ProgressSink) -> Result<RunReport, PmcError> {
        let ids = self.search(sink)?;
        let download_dir = self.config.download_dir();
        fs::create_dir_all(download_dir.as_std_path())
            .map_err(|err| PmcError::Filesystem(format!("create {download_dir}: {err}")))?;

        let items = ids
            .iter()
            .map(|raw| self.process(raw, table, sink))
            .collect::<Vec<_>>();
        Ok(RunReport::new(&self.config, items))
    }

    pub fn process(&self, raw_id: &str, table: &PathTable, sink: &dyn ProgressSink) -> ItemReport {
        let id = match raw_id.parse::<PmcId>() {
            Ok(id) => id,
            Err(err) => {
                sink.event(ProgressEvent::warn(err.to_string()));
                return ItemReport {
                    id: raw_id.to_string(),
                    url: None,
                    status: ItemStatus::InvalidId {
                        message: err.to_string(),
                    },
                };
            }
        };

        let Some(relative_path) = table.resolve(&id) else {
            sink.event(ProgressEvent::info(format!(
                "no package listed for {}",
                id.accession()
            )));
            return ItemReport {
                id: id.to_string(),
                url: None,
                status: ItemStatus::NotInFileList,
            };
        };

        let url = self.config.package_url(relative_path);
        let status = self.download_and_unpack(&id, &url, sink);
        ItemReport {
            id: id.to_string(),
            url: Some(url),
            status,
        }
    }

    /// Fetches the OA file list into the configured `file_list` path.
    pub fn download_file_list(&self, sink: &dyn ProgressSink) -> Result<FetchOutcome, PmcError> {
        let target = &self.config.file_list;
        let dir = target
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map(|parent| parent.to_path_buf())
            .unwrap_or_else(|| ".".into());
        let name = target
            .file_name()
            .ok_or_else(|| PmcError::Filesystem(format!("invalid file list path {target}")))?;
        let url = self.config.file_list_url();

        sink.event(ProgressEvent::info(format!("downloading {url}")));
        let start = Instant::now();
        let outcome = self.fetcher.fetch(&url, dir.as_std_path(), Some(name))?;
        match &outcome {
            FetchOutcome::Saved { path, bytes } => sink.event(ProgressEvent::timed(
                format!("file list saved to {} ({bytes} bytes)", path.display()),
                start.elapsed(),
            )),
            FetchOutcome::Rejected { status } => sink.event(ProgressEvent::warn(format!(
                "failed to download {url}: HTTP status {status}"
            ))),
        }
        Ok(outcome)
    }

    fn download_and_unpack(&self, id: &PmcId, url: &str, sink: &dyn ProgressSink) -> ItemStatus {
        let download_dir = self.config.download_dir();
        sink.event(ProgressEvent::info(format!("fetching {}", id.accession())));
        let start = Instant::now();
        match self
            .fetcher
            .fetch(url, download_dir.as_std_path(), Some(&id.archive_name()))
        {
            Ok(FetchOutcome::Saved { path, bytes }) => sink.event(ProgressEvent::timed(
                format!("downloaded {} ({bytes} bytes)", path.display()),
                start.elapsed(),
            )),
            Ok(FetchOutcome::Rejected { status }) => {
                sink.event(ProgressEvent::warn(format!(
                    "failed to download {url}: HTTP status {status}"
                )));
                return ItemStatus::DownloadRejected { status };
            }
            Err(err) => {
                sink.event(ProgressEvent::warn(format!(
                    "failed to download {url}: {err}"
                )));
                return ItemStatus::DownloadFailed {
                    message: err.to_string(),
                };
            }
        }

        match unpack_pdfs(id, download_dir.as_std_path(), sink) {
            Ok(report) if report.is_empty() => ItemStatus::NoPdf,
            Ok(report) => ItemStatus::Extracted {
                moved: report.moved(),
                conflicts: report.conflicts(),
            },
            Err(err) => {
                sink.event(ProgressEvent::warn(format!(
                    "unpacking {} failed: {err}",
                    id.archive_name()
                )));
                ItemStatus::UnpackFailed {
                    message: err.to_string(),
                }
            }
        }
    }
}
