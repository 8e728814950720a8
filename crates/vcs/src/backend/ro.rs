//! Read-only VCS backend.
//!
//! Dry-run counterpart of the storage crate's read-only backend: reads go to
//! the real repository, writes are logged and reported as successful without
//! touching it.

use async_trait::async_trait;
use confsync_storage::fingerprint::blob_hash;

use crate::error::Result;
use crate::models::{TreeEntry, VcsFile};
use crate::{VcsBackend, VcsHandle};

#[derive(Clone)]
pub struct ReadOnlyVcs {
    inner: VcsHandle,
}
impl ReadOnlyVcs {
    pub fn new(inner: VcsHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl VcsBackend for ReadOnlyVcs {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_file(&self, path: &str, reference: &str) -> Result<VcsFile> {
        self.inner.get_file(path, reference).await
    }

    async fn exists(&self, path: &str, reference: &str) -> Result<bool> {
        self.inner.exists(path, reference).await
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
        _sha: Option<&str>,
    ) -> Result<String> {
        tracing::info!(
            backend = self.inner.name(),
            path,
            branch,
            commit_message = message,
            "Skipping file commit during dry run"
        );
        Ok(blob_hash(content))
    }

    async fn delete_file(&self, path: &str, message: &str, _sha: &str, branch: &str) -> Result<()> {
        tracing::info!(
            backend = self.inner.name(),
            path,
            branch,
            commit_message = message,
            "Skipping file deletion during dry run"
        );
        Ok(())
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        self.inner.get_ref(branch).await
    }

    async fn commit_tree(&self, commit: &str) -> Result<String> {
        self.inner.commit_tree(commit).await
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        tracing::info!(backend = self.inner.name(), entries = entries.len(), "Skipping tree creation during dry run");
        Ok(base_tree.to_string())
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        tracing::info!(
            backend = self.inner.name(),
            tree,
            commit_message = message,
            "Skipping commit creation during dry run"
        );
        Ok(parents.first().cloned().unwrap_or_else(|| tree.to_string()))
    }

    async fn update_ref(&self, branch: &str, commit: &str) -> Result<()> {
        tracing::info!(backend = self.inner.name(), branch, commit, "Skipping branch update during dry run");
        Ok(())
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backend::MockVcs;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_are_dropped_reads_pass_through() {
        let mock = Arc::new(MockVcs::new().with_branch("main", [("config/staging/a.json", "{}")]));
        let backend = ReadOnlyVcs::new(mock.clone());

        let sha = backend.put_file("config/staging/b.json", b"[]", "add", "main", None).await.unwrap();
        assert_eq!(sha, blob_hash(b"[]"));
        let head = backend.get_ref("main").await.unwrap();
        let tree = backend.commit_tree(&head).await.unwrap();
        let new_tree = backend.create_tree(&tree, &[TreeEntry::remove("config/staging/a.json")]).await.unwrap();
        let commit = backend.create_commit("remove", &new_tree, &[head.clone()]).await.unwrap();
        backend.update_ref("main", &commit).await.unwrap();

        assert_eq!(mock.get_ref("main").await.unwrap(), head);
        assert!(mock.file("main", "config/staging/b.json").await.is_none());
        assert_eq!(backend.get_file("config/staging/a.json", "main").await.unwrap().content, b"{}");
    }
}
