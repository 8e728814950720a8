//! Error types for the [`execute`](super) module.
//!
//! Every variant carries the [`Failure`] class of the backend error that
//! caused it, so a per-file report can say whether retrying makes sense.

use crate::record::Backend;
use confsync_storage::error::Failure;
use derive_more::{Display, Error};

/// An execution error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for execution.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading the current destination state failed.
    #[display("could not read the {_0} copy ({_1})")]
    Read(#[error(not(source))] Backend, #[error(not(source))] Failure),
    /// Writing the file failed.
    #[display("could not write to {_0} ({_1})")]
    Write(#[error(not(source))] Backend, #[error(not(source))] Failure),
    /// Deleting the file failed.
    #[display("could not delete from {_0} ({_1})")]
    Delete(#[error(not(source))] Backend, #[error(not(source))] Failure),
    /// A missing VCS directory could not be created.
    #[display("could not create placeholder {_0} ({_1})")]
    Placeholder(#[error(not(source))] String, #[error(not(source))] Failure),
    /// Building or publishing a multi-file commit failed; no file in it landed.
    #[display("batch commit to {branch} failed ({failure})")]
    Batch {
        #[error(not(source))]
        branch: String,
        #[error(not(source))]
        failure: Failure,
    },
    /// A create or update was requested without source content.
    #[display("no source content to write")]
    MissingContent,
    #[display("no VCS backend is configured")]
    NoVcs,
}

impl ErrorKind {
    pub fn failure(&self) -> Failure {
        match self {
            Self::Read(_, failure)
            | Self::Write(_, failure)
            | Self::Delete(_, failure)
            | Self::Placeholder(_, failure)
            | Self::Batch { failure, .. } => *failure,
            Self::MissingContent | Self::NoVcs => Failure::Fatal,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        self.failure() == Failure::Transient
    }
}
