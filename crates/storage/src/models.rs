//! Storage models.

use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// User-defined object metadata (the `x-amz-meta-*` headers on S3).
///
/// Keys are stored lowercase. Backends without metadata support (the local
/// filesystem) always return an empty map.
pub type Metadata = BTreeMap<String, String>;

/// File metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
    /// Object metadata, empty when the backend has none
    pub metadata: Metadata,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// File contents together with its metadata, as returned by
/// [`StorageBackend::get`](crate::StorageBackend::get).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub info: FileInfo,
    pub data: Vec<u8>,
}
