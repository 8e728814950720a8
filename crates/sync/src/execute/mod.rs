//! Applying decisions to a destination backend.
//!
//! The [`Executor`] turns one [`Decision`] for one [`SyncRecord`] into writes:
//!
//! - **Local tree**: plain file writes and deletes.
//! - **Object store**: writes carry provenance tags as object metadata.
//! - **VCS**: single-file commits guarded by the destination's blob SHA, with
//!   [placeholders](placeholder) for directories that don't exist yet.
//!
//! Deleting something that is already gone is a success everywhere. Multi-file
//! VCS commits go through [`BatchCommit`] instead.

mod batch;
pub mod error;
mod placeholder;

pub use self::batch::BatchCommit;
use self::error::{ErrorKind, Result};
use crate::context::Context;
use crate::decide::{Action, Decision, Policy, Reason, decide};
use crate::error::ClassifyExt;
use crate::provenance::{self, Direction, Tag};
use crate::record::{Backend, SyncRecord};
use crate::report::{FileReport, Skipped};
use crate::state::Snapshot;
use confsync_storage::Metadata;
use derive_more::Display;
use exn::OptionExt;
use std::path::Path;
use time::OffsetDateTime;

/// What executing a decision did.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    #[display("created")]
    Created,
    #[display("updated")]
    Updated,
    #[display("deleted")]
    Deleted,
    /// A delete found nothing to delete.
    #[display("already absent")]
    AlreadyAbsent,
    #[display("skipped: {_0}")]
    Skipped(Reason),
}

impl Outcome {
    fn written(action: Action) -> Self {
        match action {
            Action::Create => Self::Created,
            _ => Self::Updated,
        }
    }
}

/// Direction recorded on writes from `source` into `destination`.
fn direction(source: Backend, destination: Backend) -> Direction {
    match (source.system(), destination.system()) {
        ("github", "s3") => Direction::GithubToS3,
        ("s3", "github") => Direction::S3ToGithub,
        (from, to) => Direction::Other(format!("{from}-to-{to}")),
    }
}

fn label(backend: Backend) -> &'static str {
    match backend {
        Backend::Local => "local",
        Backend::ObjectStore => "S3",
        Backend::Vcs => "GitHub",
    }
}

pub struct Executor<'a> {
    ctx: &'a Context,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Decide between the current `source` and `destination` state of a file
    /// and apply the decision.
    pub(crate) async fn sync(
        &self,
        record: SyncRecord,
        source: Snapshot,
        destination: Snapshot,
        policy: &Policy,
    ) -> FileReport {
        let decision = decide(&source.side, &destination.side, policy, OffsetDateTime::now_utc());
        tracing::debug!(
            path = %record.destination_path,
            action = %decision.action,
            reason = %decision.reason,
            "Decided"
        );
        let mut record = record
            .with_provenance(source.side.provenance)
            .with_destination_version(destination.version);
        if let Some(content) = source.content {
            record = record.with_content(content);
        }
        self.apply(&decision, &record).await
    }

    /// Apply `decision` and report the result for the file; errors never
    /// escape, they become a failed [`FileReport`].
    pub async fn apply(&self, decision: &Decision, record: &SyncRecord) -> FileReport {
        let path = record.destination_path.as_str();
        if decision.is_skip() {
            return FileReport::skipped(Some(record.environment), path, Skipped::Decision(decision.reason));
        }
        match self.execute(decision, record).await {
            Ok(outcome) => FileReport::applied(record.environment, path, outcome),
            Err(e) => {
                tracing::debug!(path, error = ?e, "Execution failed");
                FileReport::failed(record.environment, path, e.failure(), e.to_string())
            },
        }
    }

    /// Apply `decision` to the record's destination.
    #[tracing::instrument(
        skip_all,
        fields(
            environment = %record.environment,
            folder = %record.folder,
            file = %record.file,
            destination = %record.destination,
            action = %decision.action,
            reason = %decision.reason,
        )
    )]
    pub async fn execute(&self, decision: &Decision, record: &SyncRecord) -> Result<Outcome> {
        if decision.action == Action::Skip {
            return Ok(Outcome::Skipped(decision.reason));
        }
        match record.destination {
            Backend::Local => self.execute_local(decision.action, record).await,
            Backend::ObjectStore => self.execute_object_store(decision.action, record).await,
            Backend::Vcs => self.execute_vcs(decision.action, record).await,
        }
    }

    async fn execute_local(&self, action: Action, record: &SyncRecord) -> Result<Outcome> {
        let path = Path::new(&record.destination_path);
        if action == Action::Delete {
            return match self.ctx.local.delete(path).await {
                Ok(()) => Ok(Outcome::Deleted),
                Err(e) if e.is_not_found() => Ok(Outcome::AlreadyAbsent),
                Err(e) => Err(e).or_classify(|failure| ErrorKind::Delete(Backend::Local, failure)),
            };
        }
        let content = record.content.as_deref().ok_or_raise(|| ErrorKind::MissingContent)?;
        self.ctx
            .local
            .write(path, content, &Metadata::new())
            .await
            .or_classify(|failure| ErrorKind::Write(Backend::Local, failure))?;
        Ok(Outcome::written(action))
    }

    async fn execute_object_store(&self, action: Action, record: &SyncRecord) -> Result<Outcome> {
        let key = Path::new(&record.destination_path);
        if action == Action::Delete {
            return match self.ctx.store.delete(key).await {
                Ok(()) => Ok(Outcome::Deleted),
                Err(e) if e.is_not_found() => Ok(Outcome::AlreadyAbsent),
                Err(e) => Err(e).or_classify(|failure| ErrorKind::Delete(Backend::ObjectStore, failure)),
            };
        }
        let content = record.content.as_deref().ok_or_raise(|| ErrorKind::MissingContent)?;
        let hash = record.content_hash.clone().unwrap_or_else(|| confsync_storage::fingerprint::content_hash(content));
        let source = self.ctx.config.sync_source(record.environment);
        let synced_from = match record.copied_from {
            Some(from) => format!("{source}-{from}-copy"),
            None => source,
        };
        let metadata = provenance::tag(
            &Tag {
                synced_from: &synced_from,
                direction: direction(record.source, Backend::ObjectStore),
                file_hash: &hash,
                environment: record.environment,
                folder: &record.folder,
                file: &record.file,
                commit_sha: self.ctx.config.commit_sha.as_deref(),
                copied_from: record.copied_from,
            },
            OffsetDateTime::now_utc(),
        );
        self.ctx
            .store
            .write(key, content, &metadata)
            .await
            .or_classify(|failure| ErrorKind::Write(Backend::ObjectStore, failure))?;
        Ok(Outcome::written(action))
    }

    async fn execute_vcs(&self, action: Action, record: &SyncRecord) -> Result<Outcome> {
        let vcs = self.ctx.vcs.as_deref().ok_or_raise(|| ErrorKind::NoVcs)?;
        let path = record.destination_path.as_str();
        let branch = self.ctx.branch(record.environment);
        let _guard = self.ctx.ref_locks.lock(branch).await;

        // A version is required to update or delete; look it up if the caller
        // didn't already have it.
        let version = match (&record.destination_version, action) {
            (Some(version), _) => Some(version.clone()),
            (None, Action::Create) => None,
            (None, _) => match vcs.get_file(path, branch).await {
                Ok(file) => Some(file.sha),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e).or_classify(|failure| ErrorKind::Read(Backend::Vcs, failure)),
            },
        };

        if action == Action::Delete {
            let Some(sha) = version else {
                return Ok(Outcome::AlreadyAbsent);
            };
            let message = format!(
                "Remove {} (deleted from {}, {})",
                record.file,
                label(record.source),
                record.environment
            );
            return match vcs.delete_file(path, &message, &sha, branch).await {
                Ok(()) => Ok(Outcome::Deleted),
                Err(e) if e.is_not_found() => Ok(Outcome::AlreadyAbsent),
                Err(e) => Err(e).or_classify(|failure| ErrorKind::Delete(Backend::Vcs, failure)),
            };
        }

        let content = record.content.as_deref().ok_or_raise(|| ErrorKind::MissingContent)?;
        let placeholders = match version {
            Some(_) => Vec::new(),
            None => placeholder::create(vcs, path, branch).await?,
        };
        let message = format!("Sync {} from {} ({})", record.file, label(record.source), record.environment);
        let written = vcs
            .put_file(path, content, &message, branch, version.as_deref())
            .await
            .or_classify(|failure| ErrorKind::Write(Backend::Vcs, failure));
        // Placeholders go whether or not the write succeeded.
        placeholder::remove(vcs, &placeholders, branch).await;
        let sha = written?;
        tracing::debug!(path, branch, %sha, "Committed file");
        Ok(match version {
            Some(_) => Outcome::Updated,
            None => Outcome::Created,
        })
    }
}
