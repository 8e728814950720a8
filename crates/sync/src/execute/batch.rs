use crate::context::RefLocks;
use crate::error::ClassifyExt;
use crate::execute::error::{ErrorKind, Result};
use confsync_vcs::{TreeEntry, VcsBackend};

/// Many file changes published as a single commit.
///
/// The commit is built on the branch head read at [`commit`](Self::commit)
/// time and published with a non-forced ref update. If anything fails,
/// including the branch moving underneath us, nothing in the batch is visible
/// on the branch.
#[derive(Debug, Clone)]
pub struct BatchCommit {
    branch: String,
    message: String,
    entries: Vec<TreeEntry>,
}

impl BatchCommit {
    pub fn new(branch: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            message: message.into(),
            entries: Vec::new(),
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn push(&mut self, entry: TreeEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Publish the batch, returning the new commit SHA (`None` when empty).
    ///
    /// The branch lock is held from reading the head until the ref update.
    pub async fn commit(&self, vcs: &dyn VcsBackend, locks: &RefLocks) -> Result<Option<String>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let _guard = locks.lock(&self.branch).await;
        let raise = |failure| ErrorKind::Batch {
            branch: self.branch.clone(),
            failure,
        };
        let head = vcs.get_ref(&self.branch).await.or_classify(raise)?;
        let base_tree = vcs.commit_tree(&head).await.or_classify(raise)?;
        let tree = vcs.create_tree(&base_tree, &self.entries).await.or_classify(raise)?;
        let commit = vcs.create_commit(&self.message, &tree, &[head]).await.or_classify(raise)?;
        vcs.update_ref(&self.branch, &commit).await.or_classify(raise)?;
        tracing::info!(branch = %self.branch, %commit, files = self.entries.len(), "Published batch commit");
        Ok(Some(commit))
    }
}
