//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{FileInfo, Metadata, Object};
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct Entry {
    modified: OffsetDateTime,
    data: Vec<u8>,
    metadata: Metadata,
}

/// In-memory storage backend for testing.
///
/// Files (and their metadata) are stored in a `HashMap` behind a [`RwLock`],
/// so all trait methods can operate on `&self` without external
/// synchronisation. Writes to paths registered with
/// [`failing_on`](Self::failing_on) fail with a backend error, which lets
/// tests exercise per-file failure handling.
///
/// # Examples
///
/// ```
/// use confsync_storage::Metadata;
/// use confsync_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("config/staging/test.json", b"{}"),
/// ]);
/// assert!(backend.exists(Path::new("config/staging/test.json")).await?);
///
/// backend.write(Path::new("config/staging/other.json"), b"[]", &Metadata::new()).await?;
/// assert_eq!(backend.writes(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Entry>>,
    failing: HashSet<PathBuf>,
    writes: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files that carry no metadata.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        Self::with_objects(files.into_iter().map(|(path, data)| (path, data, Metadata::new())))
    }

    /// Create a mock backend pre-populated with files and their metadata.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>, Metadata)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data, metadata) in objects {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid path {}", path.display());
            };
            map.insert(
                validated,
                Entry {
                    modified: now,
                    data: data.into(),
                    metadata,
                },
            );
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing: HashSet::new(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every write, delete and rename touching `path` fail.
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let Ok(validated) = validate_path(&path) else {
            panic!("MockBackend::failing_on: invalid path {}", path.display());
        };
        self.failing.insert(validated);
        self
    }

    /// Number of successful writes (puts) performed through the trait.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_failing(&self, path: &Path) -> Result<()> {
        if self.failing.contains(path) {
            exn::bail!(ErrorKind::BackendError(format!("injected failure for {}", path.display())));
        }
        Ok(())
    }

    fn file_info(path: &Path, entry: &Entry) -> FileInfo {
        FileInfo::new(path, entry.data.len() as u64, entry.modified).with_metadata(entry.metadata.clone())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let mut entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, entry)| Self::file_info(path, entry))
                    .collect()
            };
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn get(&self, path: &Path) -> Result<Object> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let entry = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Object {
            info: Self::file_info(&path, entry),
            data: entry.data.clone(),
        })
    }

    async fn write(&self, path: &Path, data: &[u8], metadata: &Metadata) -> Result<()> {
        let path = validate_path(path)?;
        self.check_failing(&path)?;
        let entry = Entry {
            modified: OffsetDateTime::now_utc(),
            data: data.to_vec(),
            metadata: metadata.clone(),
        };
        self.storage.write().await.insert(path, entry);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.check_failing(&path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        self.check_failing(&from)?;
        self.check_failing(&to)?;
        let mut guard = self.storage.write().await;
        let entry = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, entry);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let entry = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let backend = MockBackend::default();
        let metadata = Metadata::from([("file-hash".to_string(), "abc".to_string())]);
        backend.write(Path::new("config/staging/test.json"), b"{}", &metadata).await.unwrap();
        let object = backend.get(Path::new("config/staging/test.json")).await.unwrap();
        assert_eq!(object.data, b"{}");
        assert_eq!(object.info.metadata, metadata);
        let info = backend.stat(Path::new("config/staging/test.json")).await.unwrap();
        assert_eq!(info.metadata, metadata);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.json")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_prefixed() {
        let backend = MockBackend::with_files([
            ("config/staging/b.json", "2"),
            ("config/staging/a.json", "1"),
            ("config/staging2/c.json", "3"),
        ]);
        let files = backend.list(Some(Path::new("config/staging"))).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, [PathBuf::from("config/staging/a.json"), PathBuf::from("config/staging/b.json")]);
    }

    #[tokio::test]
    async fn test_failing_path() {
        let backend = MockBackend::with_files([("bad.json", "{}")]).failing_on("bad.json");
        let err = backend.write(Path::new("bad.json"), b"[]", &Metadata::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert_eq!(backend.read(Path::new("bad.json")).await.unwrap(), b"{}");
        assert_eq!(backend.writes(), 0);
    }
}
