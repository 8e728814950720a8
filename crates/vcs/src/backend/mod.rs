//! VCS backend trait and implementations.
//!
//! Two families of operation are exposed. The contents operations read and
//! write one file per commit, guarded by the blob SHA the caller last saw. The
//! git data operations build a single commit touching many files and then
//! advance a branch, refusing anything that is not a fast-forward.

#[cfg(feature = "github")]
mod github;
#[cfg(feature = "mock")]
mod mock;
mod ro;

#[cfg(feature = "github")]
pub use self::github::GitHubBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockVcs;
pub use self::ro::ReadOnlyVcs;
use crate::error::Result;
use crate::models::{TreeEntry, VcsFile};
use async_trait::async_trait;

#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Read a file at a branch name or commit SHA.
    async fn get_file(&self, path: &str, reference: &str) -> Result<VcsFile>;

    /// Check whether a file or directory exists at a branch name or commit SHA.
    async fn exists(&self, path: &str, reference: &str) -> Result<bool>;

    /// Create or update a single file as its own commit on `branch`.
    ///
    /// `sha` must be the current blob SHA when updating and `None` when
    /// creating; anything else is a [`Conflict`](crate::error::ErrorKind::Conflict).
    /// Returns the blob SHA of the written content.
    async fn put_file(&self, path: &str, content: &[u8], message: &str, branch: &str, sha: Option<&str>)
    -> Result<String>;

    /// Delete a single file as its own commit on `branch`.
    async fn delete_file(&self, path: &str, message: &str, sha: &str, branch: &str) -> Result<()>;

    /// Resolve a branch to its head commit SHA.
    async fn get_ref(&self, branch: &str) -> Result<String>;

    /// Resolve a commit to its root tree SHA.
    async fn commit_tree(&self, commit: &str) -> Result<String>;

    /// Create a tree by applying `entries` on top of `base_tree`.
    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;

    /// Create a commit object. The branch is not moved.
    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String>;

    /// Point `branch` at `commit`, failing with a conflict unless this is a
    /// fast-forward.
    async fn update_ref(&self, branch: &str, commit: &str) -> Result<()>;
}
