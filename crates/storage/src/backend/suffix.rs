//! Suffix-filtered storage backend decorator.
//!
//! Wraps another backend and restricts all operations to file names ending in
//! a given suffix (`.json` for configuration files).

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::models::{Metadata, Object};
use crate::{BackendHandle, StorageBackend, error::Result, models::FileInfo};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > suffix.len() && name.to_ascii_lowercase().ends_with(suffix))
}

/// Suffix-filtered storage backend.
///
/// Listings silently omit non-matching files; every other operation on a
/// non-matching path returns [`ErrorKind::FilteredPath`].
#[derive(Clone)]
pub struct SuffixFilterBackend {
    inner: BackendHandle,
    suffix: String,
}
impl SuffixFilterBackend {
    pub fn new(inner: BackendHandle, suffix: impl Into<String>) -> Self {
        Self {
            inner,
            suffix: suffix.into().to_ascii_lowercase(),
        }
    }

    fn check(&self, path: &Path) -> Result<()> {
        if !has_suffix(path, &self.suffix) {
            exn::bail!(ErrorKind::FilteredPath(path.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SuffixFilterBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        Box::pin(self.inner.list_stream(prefix).filter(|item| {
            std::future::ready(match item {
                Ok(info) => has_suffix(&info.path, &self.suffix),
                Err(_) => true, // propagate errors
            })
        }))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.check(path)?;
        self.inner.exists(path).await
    }

    async fn get(&self, path: &Path) -> Result<Object> {
        self.check(path)?;
        self.inner.get(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.check(path)?;
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8], metadata: &Metadata) -> Result<()> {
        self.check(path)?;
        self.inner.write(path, data, metadata).await
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.check(path)?;
        self.inner.delete(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        self.inner.rename(from, to).await
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.check(path)?;
        self.inner.stat(path).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        self.inner.create_dir(path).await
    }
}
