//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant except [`ErrorKind::Io`] is fatal for a sync run: an invalid
/// registry or unreadable configuration means no file can be resolved safely.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The registry file does not exist.
    #[display("registry not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The registry file could not be read or written.
    #[display("I/O error on registry file: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The registry file is not valid registry JSON.
    #[display("malformed registry: {}", _0.display())]
    Malformed(#[error(not(source))] PathBuf),
    /// The registry parsed but violates one or more invariants.
    #[display("invalid registry configuration:\n  - {}", _0.join("\n  - "))]
    ConfigInvalid(#[error(not(source))] Vec<String>),
    /// Layered runtime settings could not be extracted.
    #[display("could not load runtime settings")]
    Settings,
    /// A setting required for the requested operation is empty.
    #[display("missing required setting: {_0}")]
    MissingSetting(#[error(not(source))] &'static str),
    /// A folder with this name is already registered.
    #[display("folder already exists: {_0}")]
    FolderExists(#[error(not(source))] String),
    /// No folder with this name is registered.
    #[display("folder not found: {_0}")]
    FolderNotFound(#[error(not(source))] String),
    /// The folder already tracks a file with this name.
    #[display("file {_1} already tracked in folder {_0}")]
    FileExists(#[error(not(source))] String, #[error(not(source))] String),
    /// Tracked file names must carry the monitored suffix.
    #[display("tracked file name must end in .json: {_0}")]
    InvalidFileName(#[error(not(source))] String),
    /// An environment literal other than `staging` or `production`.
    #[display("unknown environment: {_0}")]
    UnknownEnvironment(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
