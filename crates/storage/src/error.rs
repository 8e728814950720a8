//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Backend adapters translate their
//! native failures into an [`ErrorKind`] exactly once, at the adapter
//! boundary; callers then branch on [`ErrorKind::failure`] instead of
//! inspecting SDK errors.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification shared by every backend (object store, local tree
/// and VCS host) so the sync layer can react uniformly.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The file or object does not exist. Treated as "absent", not an error,
    /// by the decision engine.
    #[display("not-found")]
    NotFound,
    /// An optimistic-concurrency precondition was rejected.
    #[display("conflict")]
    Conflict,
    /// Retrying later might succeed.
    #[display("transient")]
    Transient,
    /// Retrying will not help.
    #[display("fatal")]
    Fatal,
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// A conditional write was rejected by the backend
    #[display("precondition failed: {}", _0.display())]
    Conflict(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (S3 connections, throttling, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// Path rejected by a suffix filter
    #[display("filtered path: {}", _0.display())]
    FilteredPath(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Classify this error for the sync layer.
    pub fn failure(&self) -> Failure {
        match self {
            Self::NotFound(_) => Failure::NotFound,
            Self::Conflict(_) => Failure::Conflict,
            Self::Io(_) | Self::Network(_) => Failure::Transient,
            Self::PermissionDenied(_) | Self::InvalidPath(_) | Self::BackendError(_) | Self::FilteredPath(_) => {
                Failure::Fatal
            },
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::NotFound(PathBuf::from("a.json")), Failure::NotFound)]
    #[case(ErrorKind::Conflict(PathBuf::from("a.json")), Failure::Conflict)]
    #[case(ErrorKind::Network("timeout".to_string()), Failure::Transient)]
    #[case(ErrorKind::Io(IoError::other("disk")), Failure::Transient)]
    #[case(ErrorKind::PermissionDenied(PathBuf::from("a.json")), Failure::Fatal)]
    #[case(ErrorKind::FilteredPath(PathBuf::from("a.txt")), Failure::Fatal)]
    fn test_failure_classification(#[case] kind: ErrorKind, #[case] expected: Failure) {
        assert_eq!(kind.failure(), expected);
        assert_eq!(kind.is_retryable(), expected == Failure::Transient);
    }
}
