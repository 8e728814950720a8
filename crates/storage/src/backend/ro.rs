//! Read-only storage backend.
//!
//! Wraps another backend and prevents write operations from executing, while
//! still reporting success. This is how dry runs are implemented: every
//! decision is made against real state, and nothing is changed.

use async_trait::async_trait;
use std::path::Path;

use crate::models::{Metadata, Object};
use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result, models::FileInfo};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn get(&self, path: &Path) -> Result<Object> {
        self.inner.get(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8], metadata: &Metadata) -> Result<()> {
        tracing::info!(
            backend = self.inner.name(),
            path = %path.display(),
            bytes = data.len(),
            tags = metadata.len(),
            "Skipping write during dry run"
        );
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(backend = self.inner.name(), path = %path.display(), "Skipping delete during dry run");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tracing::info!(
            backend = self.inner.name(),
            from = %from.display(),
            to = %to.display(),
            "Skipping rename during dry run"
        );
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        tracing::info!(backend = self.inner.name(), path = %path.display(), "Skipping directory creation during dry run");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_are_dropped_reads_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.json"), b"{}").unwrap();
        let inner: BackendHandle = Arc::new(LocalBackend::new("local", dir.path()).unwrap());
        let backend = ReadOnlyBackend::new(inner);

        backend.write(Path::new("new.json"), b"[]", &Metadata::new()).await.unwrap();
        backend.delete(Path::new("existing.json")).await.unwrap();
        backend.create_dir(Path::new("some/dir")).await.unwrap();

        assert!(!dir.path().join("new.json").exists());
        assert!(!dir.path().join("some").exists());
        assert_eq!(backend.read(Path::new("existing.json")).await.unwrap(), b"{}");
    }
}
