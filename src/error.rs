//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Settings or the folder registry could not be loaded.
    #[display("could not load configuration")]
    Config,
    /// A backend could not be constructed from the settings.
    #[display("could not set up the {_0} backend")]
    Backend(#[error(not(source))] &'static str),
    /// A sync run aborted before finishing.
    #[display("{_0} aborted")]
    Aborted(#[error(not(source))] &'static str),
    #[display("could not read event from {}", _0.display())]
    EventFile(#[error(not(source))] PathBuf),
    /// The run finished but some files failed.
    #[display("{_0} file(s) failed")]
    FilesFailed(#[error(not(source))] usize),
    /// The registry failed validation.
    #[display("{_0} registry problem(s) found")]
    RegistryInvalid(#[error(not(source))] usize),
    /// A registry maintenance command failed.
    #[display("could not update the folder registry")]
    Registry,
    /// A local file operation of a registry maintenance command failed.
    #[display("local file operation failed on {_0}")]
    Local(#[error(not(source))] String),
}
