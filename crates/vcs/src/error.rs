//! VCS Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. HTTP statuses from the VCS host are
//! mapped onto these kinds inside the adapter, never by callers.

use confsync_storage::error::Failure;
use derive_more::{Display, Error};

/// A VCS error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for VCS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File, ref or commit does not exist.
    #[display("not found in repository: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The write was based on a stale version: a blob SHA mismatch on a file
    /// write, or a ref update that is not a fast-forward.
    #[display("rejected as stale: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Token missing, expired or lacking permission.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Connection failures, throttling and server errors.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Repository path escapes the root or is not UTF-8.
    #[display("invalid repository path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// A path names a directory where a file was expected.
    #[display("not a file: {_0}")]
    NotAFile(#[error(not(source))] String),
    /// The host answered with something that could not be understood.
    #[display("unexpected response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// Any other rejected request.
    #[display("request rejected with HTTP {status}: {message}")]
    Api {
        #[error(not(source))]
        status: u16,
        #[error(not(source))]
        message: String,
    },
}

impl ErrorKind {
    /// Classify this error for the sync layer.
    pub fn failure(&self) -> Failure {
        match self {
            Self::NotFound(_) => Failure::NotFound,
            Self::Conflict(_) => Failure::Conflict,
            Self::Network(_) => Failure::Transient,
            Self::PermissionDenied(_)
            | Self::InvalidPath(_)
            | Self::NotAFile(_)
            | Self::InvalidResponse(_)
            | Self::Api { .. } => Failure::Fatal,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        self.failure() == Failure::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.failure() == Failure::NotFound
    }
}
