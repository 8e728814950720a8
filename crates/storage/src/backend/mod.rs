//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface over the local configuration tree and the S3 object store. Both
//! sides of a sync are addressed the same way: relative paths, whole-file
//! reads and writes, and per-file metadata (which only the object store
//! actually persists).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;
mod suffix;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
#[cfg(feature = "s3")]
pub use self::s3::{S3Backend, S3Credentials};
pub use self::suffix::SuffixFilterBackend;
use crate::error::Result;
use crate::models::{FileInfo, Metadata, Object};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use confsync_storage::{backend::StorageBackend, error::Result, fingerprint::content_hash};
///
/// async fn hash_if_present(backend: &dyn StorageBackend) -> Result<Option<String>> {
///     let path = Path::new("config/staging/test.json");
///     if backend.exists(path).await? {
///         Ok(Some(content_hash(&backend.read(path).await?)))
///     } else {
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning, so a listing either completes or fails as a unit.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// The prefix is matched per path component: `config/staging` matches
    /// `config/staging/test.json` but not `config/staging2/test.json`.
    /// Listings may omit per-file metadata; use [`stat()`](Self::stat) for it.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents and metadata.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn get(&self, path: &Path) -> Result<Object>;

    /// Read file contents only.
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.get(path).await?.data)
    }

    /// Write file contents along with metadata.
    ///
    /// Creates a new file or overwrites an existing file with the provided
    /// data. Backends that can't persist metadata ignore it.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8], metadata: &Metadata) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed
    /// - If the destination already exists, it will be overwritten
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Make sure a directory exists. Flat namespaces (object stores) have
    /// nothing to do here.
    async fn create_dir(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
