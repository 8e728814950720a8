//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Only errors that abort a whole run
//! (or a whole event) surface here; a single file failing is recorded in the
//! [`Summary`](crate::Summary) instead.

use confsync_storage::error::Failure;
use derive_more::{Display, Error};
use exn::ResultExt;

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The registry failed structural validation; nothing may be synced.
    #[display("folder registry is invalid")]
    ConfigInvalid,
    /// The operation needs a VCS backend and none was configured.
    #[display("no VCS backend is configured")]
    NoVcs,
    /// The event payload is not an object-store notification.
    #[display("event is not a valid object-store notification")]
    InvalidEvent,
    /// A storage backend failed outside of any single file (listing a prefix).
    #[display("storage backend failed ({_0})")]
    Storage(#[error(not(source))] Failure),
    /// The VCS backend failed outside of any single file.
    #[display("VCS backend failed ({_0})")]
    Vcs(#[error(not(source))] Failure),
    /// A local file is not valid JSON and was not pushed.
    #[display("{_0} is not valid JSON")]
    InvalidJson(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn failure(&self) -> Failure {
        match self {
            Self::Storage(failure) | Self::Vcs(failure) => *failure,
            Self::ConfigInvalid | Self::NoVcs | Self::InvalidEvent | Self::InvalidJson(_) => Failure::Fatal,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        self.failure() == Failure::Transient
    }
}

/// An error kind that knows its failure class.
pub(crate) trait Classified {
    fn failure(&self) -> Failure;
}

impl Classified for confsync_storage::error::ErrorKind {
    fn failure(&self) -> Failure {
        Self::failure(self)
    }
}

impl Classified for confsync_vcs::error::ErrorKind {
    fn failure(&self) -> Failure {
        Self::failure(self)
    }
}

impl Classified for crate::execute::error::ErrorKind {
    fn failure(&self) -> Failure {
        Self::failure(self)
    }
}

/// Wrap a backend error in a new kind that records the backend's failure
/// class, so callers can still tell a conflict from an outage.
pub(crate) trait ClassifyExt<T> {
    fn or_classify<K>(self, kind: impl FnOnce(Failure) -> K) -> std::result::Result<T, exn::Exn<K>>
    where
        K: std::error::Error + Send + Sync + 'static;
}

impl<T, E> ClassifyExt<T> for std::result::Result<T, exn::Exn<E>>
where
    E: Classified + std::error::Error + Send + Sync + 'static,
{
    fn or_classify<K>(self, kind: impl FnOnce(Failure) -> K) -> std::result::Result<T, exn::Exn<K>>
    where
        K: std::error::Error + Send + Sync + 'static,
    {
        match self {
            Ok(value) => Ok(value),
            Err(e) => {
                let failure = Classified::failure(&*e);
                Err(e).or_raise(|| kind(failure))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case(confsync_storage::error::ErrorKind::NotFound(PathBuf::from("a.json")), Failure::NotFound)]
    #[case(confsync_storage::error::ErrorKind::Conflict(PathBuf::from("a.json")), Failure::Conflict)]
    #[case(confsync_storage::error::ErrorKind::Network("reset".into()), Failure::Transient)]
    fn test_classify_storage_errors(#[case] source: confsync_storage::error::ErrorKind, #[case] expected: Failure) {
        let result: confsync_storage::error::Result<()> = Err(exn::Exn::from(source));
        let err = result.or_classify(ErrorKind::Storage).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage(failure) if *failure == expected));
    }

    #[test]
    fn test_classify_vcs_errors() {
        let result: confsync_vcs::error::Result<()> =
            Err(exn::Exn::from(confsync_vcs::error::ErrorKind::Conflict("a.json".into())));
        let err = result.or_classify(ErrorKind::Vcs).unwrap_err();
        assert_eq!(err.failure(), Failure::Conflict);
        assert!(!err.is_retryable());
    }
}
