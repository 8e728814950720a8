//! Per-file results and run summaries.

use crate::decide::Reason;
use crate::error::Result;
use crate::execute::Outcome;
use crate::resolve::Unmonitored;
use confsync_config::Environment;
use confsync_storage::error::Failure;
use derive_more::Display;
use futures::{Stream, StreamExt};

/// Why nothing was done for a file.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Skipped {
    #[display("{_0}")]
    Decision(Reason),
    #[display("not monitored: {_0}")]
    NotMonitored(Unmonitored),
    #[display("not a tracked file")]
    Untracked,
    #[display("event for another bucket ({_0})")]
    OtherBucket(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Applied(Outcome),
    Skipped(Skipped),
    Failed { failure: Failure, message: String },
}

/// The result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub environment: Option<Environment>,
    /// Key, repository path or local path the result applies to.
    pub path: String,
    pub status: FileStatus,
}

impl FileReport {
    pub fn applied(environment: Environment, path: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            environment: Some(environment),
            path: path.into(),
            status: FileStatus::Applied(outcome),
        }
    }

    pub fn skipped(environment: Option<Environment>, path: impl Into<String>, skipped: Skipped) -> Self {
        Self {
            environment,
            path: path.into(),
            status: FileStatus::Skipped(skipped),
        }
    }

    pub fn failed(environment: Environment, path: impl Into<String>, failure: Failure, message: String) -> Self {
        Self {
            environment: Some(environment),
            path: path.into(),
            status: FileStatus::Failed { failure, message },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Progress events emitted by every handler and driver.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete) exactly once, with the
///    number of files (or event records) to process.
/// 3. [`File`](Self::File) once per processed file.
/// 4. [`Complete`](Self::Complete) exactly once.
///
/// A fatal error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted. Single files failing are
/// reported through [`File`](Self::File), never as stream errors.
#[derive(Debug)]
pub enum SyncEvent {
    Started,
    DiscoveryComplete(u64),
    File(FileReport),
    Complete,
}

/// Collected results of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub files: Vec<FileReport>,
}

impl Summary {
    /// Drain an event stream into a summary, logging each file result.
    ///
    /// # Errors
    /// Returns the first fatal error the stream yields. Files reported before
    /// it are lost with the summary; the run is over anyway.
    pub async fn collect(events: impl Stream<Item = Result<SyncEvent>>) -> Result<Self> {
        let mut events = std::pin::pin!(events);
        let mut summary = Self::default();
        while let Some(event) = events.next().await {
            match event? {
                SyncEvent::Started => tracing::debug!("Sync started"),
                SyncEvent::DiscoveryComplete(total) => tracing::info!(total, "Discovered files to sync"),
                SyncEvent::File(report) => summary.record(report),
                SyncEvent::Complete => tracing::debug!("Sync complete"),
            }
        }
        Ok(summary)
    }

    pub fn record(&mut self, report: FileReport) {
        let environment = report.environment.map(|e| e.as_str()).unwrap_or("-");
        match &report.status {
            FileStatus::Applied(outcome) => {
                tracing::info!(environment, path = %report.path, %outcome, "Synced");
            },
            FileStatus::Skipped(reason) => {
                tracing::info!(environment, path = %report.path, %reason, "Skipped");
            },
            FileStatus::Failed { failure, message } => {
                tracing::warn!(environment, path = %report.path, %failure, error = %message, "Failed");
            },
        }
        self.files.push(report);
    }

    pub fn succeeded(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Applied(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| report.is_failure())
    }

    /// Skips never count as failures.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|report| predicate(&report.status)).count()
    }
}
