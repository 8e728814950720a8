//! In-memory repository for testing.

use crate::VcsBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{TreeChange, TreeEntry, VcsFile};
use async_trait::async_trait;
use confsync_storage::fingerprint::blob_hash;
use exn::OptionExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

type Files = BTreeMap<String, Vec<u8>>;

struct Commit {
    tree: String,
    parents: Vec<String>,
    message: String,
}

/// A commit that lands on a branch behind the caller's back.
struct Interleaved {
    branch: String,
    path: String,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    trees: HashMap<String, Files>,
    commits: HashMap<String, Commit>,
    refs: HashMap<String, String>,
    objects: u64,
    interleaved: Option<Interleaved>,
}
impl State {
    fn next_id(&mut self, kind: &str) -> String {
        self.objects += 1;
        blob_hash(format!("{kind} {}", self.objects).as_bytes())
    }

    fn head(&self, branch: &str) -> Result<String> {
        self.refs
            .get(branch)
            .cloned()
            .ok_or_raise(|| ErrorKind::NotFound(format!("branch {branch}")))
    }

    fn resolve(&self, reference: &str) -> Result<&Commit> {
        let sha = self.refs.get(reference).map(String::as_str).unwrap_or(reference);
        self.commits
            .get(sha)
            .ok_or_raise(|| ErrorKind::NotFound(format!("reference {reference}")))
    }

    fn files_at(&self, reference: &str) -> Result<&Files> {
        let commit = self.resolve(reference)?;
        self.trees
            .get(&commit.tree)
            .ok_or_raise(|| ErrorKind::NotFound(format!("tree {}", commit.tree)))
    }

    fn store_tree(&mut self, files: Files) -> String {
        let sha = self.next_id("tree");
        self.trees.insert(sha.clone(), files);
        sha
    }

    fn store_commit(&mut self, tree: String, parents: Vec<String>, message: &str) -> String {
        let sha = self.next_id("commit");
        let message = message.to_string();
        self.commits.insert(sha.clone(), Commit { tree, parents, message });
        sha
    }

    /// Commit `files` as the new state of `branch` and advance it.
    fn advance(&mut self, branch: &str, files: Files, message: &str) -> String {
        let parents = self.refs.get(branch).cloned().into_iter().collect();
        let tree = self.store_tree(files);
        let sha = self.store_commit(tree, parents, message);
        self.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    fn is_ancestor(&self, ancestor: &str, commit: &str) -> bool {
        let mut pending = vec![commit.to_string()];
        let mut seen = HashSet::new();
        while let Some(sha) = pending.pop() {
            if sha == ancestor {
                return true;
            }
            if seen.insert(sha.clone())
                && let Some(commit) = self.commits.get(&sha)
            {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn land_interleaved(&mut self) -> Result<()> {
        if let Some(change) = self.interleaved.take() {
            let head = self.head(&change.branch)?;
            let mut files = self.files_at(&head)?.clone();
            files.insert(change.path.clone(), change.content);
            self.advance(&change.branch, files, &format!("Concurrent update of {}", change.path));
        }
        Ok(())
    }
}

/// In-memory repository for testing.
///
/// Branches, commits and trees are kept behind a [`Mutex`]. Blob SHAs use the
/// real git blob id of the content so callers can compare them with a locally
/// computed [`blob_hash`]. Writes that touch a path registered with
/// [`failing_on`](Self::failing_on) fail with a network error.
///
/// # Examples
///
/// ```
/// use confsync_vcs::backend::{MockVcs, VcsBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let vcs = MockVcs::new().with_branch("main", [("config/staging/a.json", "{}")]);
/// let file = vcs.get_file("config/staging/a.json", "main").await?;
/// vcs.put_file("config/staging/a.json", b"[]", "update", "main", Some(&file.sha)).await?;
/// assert_eq!(vcs.commit_messages("main").await, ["update", "initial commit"]);
/// # Ok(())
/// # }
/// ```
pub struct MockVcs {
    name: String,
    state: Mutex<State>,
    failing: HashSet<String>,
}

impl Default for MockVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVcs {
    pub fn new() -> Self {
        Self {
            name: "mock-vcs".to_string(),
            state: Mutex::new(State::default()),
            failing: HashSet::new(),
        }
    }

    /// Create `branch` with a single commit containing `files`.
    pub fn with_branch(
        mut self,
        branch: &str,
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let files = files.into_iter().map(|(path, content)| (path.into(), content.into())).collect();
        self.state.get_mut().advance(branch, files, "initial commit");
        self
    }

    /// Make every write touching `path` fail.
    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// The next [`create_tree`](VcsBackend::create_tree) call first lands a
    /// commit writing `content` to `path` on `branch`, as a concurrent writer
    /// would.
    pub async fn interleave_commit(&self, branch: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.state.lock().await.interleaved = Some(Interleaved {
            branch: branch.to_string(),
            path: path.to_string(),
            content: content.into(),
        });
    }

    /// Content of `path` at the head of `branch`.
    pub async fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state.files_at(branch).ok()?.get(path).cloned()
    }

    /// Every path at the head of `branch`.
    pub async fn paths(&self, branch: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state.files_at(branch).map(|files| files.keys().cloned().collect()).unwrap_or_default()
    }

    /// First-parent history of `branch`, newest first.
    pub async fn commit_messages(&self, branch: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let mut messages = Vec::new();
        let mut next = state.refs.get(branch).cloned();
        while let Some(sha) = next {
            let Some(commit) = state.commits.get(&sha) else {
                break;
            };
            messages.push(commit.message.clone());
            next = commit.parents.first().cloned();
        }
        messages
    }

    fn check_failing(&self, path: &str) -> Result<()> {
        if self.failing.contains(path) {
            exn::bail!(ErrorKind::Network(format!("injected failure for {path}")));
        }
        Ok(())
    }
}

#[async_trait]
impl VcsBackend for MockVcs {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self, path: &str, reference: &str) -> Result<VcsFile> {
        let state = self.state.lock().await;
        let files = state.files_at(reference)?;
        match files.get(path) {
            Some(content) => Ok(VcsFile {
                path: path.to_string(),
                sha: blob_hash(content),
                content: content.clone(),
            }),
            None if files.keys().any(|key| key.starts_with(&format!("{path}/"))) => {
                exn::bail!(ErrorKind::NotAFile(path.to_string()))
            },
            None => exn::bail!(ErrorKind::NotFound(path.to_string())),
        }
    }

    async fn exists(&self, path: &str, reference: &str) -> Result<bool> {
        let state = self.state.lock().await;
        let files = state.files_at(reference)?;
        let directory = format!("{}/", path.trim_end_matches('/'));
        Ok(files.contains_key(path) || files.keys().any(|key| key.starts_with(&directory)))
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
        sha: Option<&str>,
    ) -> Result<String> {
        self.check_failing(path)?;
        let mut state = self.state.lock().await;
        let head = state.head(branch)?;
        let mut files = state.files_at(&head)?.clone();
        let current = files.get(path).map(|existing| blob_hash(existing));
        match (current.as_deref(), sha) {
            (None, None) => {},
            (Some(current), Some(given)) if current == given => {},
            (Some(_), None) => exn::bail!(ErrorKind::Conflict(format!("{path} exists and no sha was supplied"))),
            (_, Some(given)) => exn::bail!(ErrorKind::Conflict(format!("{path} does not match {given}"))),
        }
        files.insert(path.to_string(), content.to_vec());
        state.advance(branch, files, message);
        Ok(blob_hash(content))
    }

    async fn delete_file(&self, path: &str, message: &str, sha: &str, branch: &str) -> Result<()> {
        self.check_failing(path)?;
        let mut state = self.state.lock().await;
        let head = state.head(branch)?;
        let mut files = state.files_at(&head)?.clone();
        let Some(existing) = files.remove(path) else {
            exn::bail!(ErrorKind::NotFound(path.to_string()));
        };
        if blob_hash(&existing) != sha {
            exn::bail!(ErrorKind::Conflict(format!("{path} does not match {sha}")));
        }
        state.advance(branch, files, message);
        Ok(())
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        self.state.lock().await.head(branch)
    }

    async fn commit_tree(&self, commit: &str) -> Result<String> {
        let state = self.state.lock().await;
        match state.commits.get(commit) {
            Some(commit) => Ok(commit.tree.clone()),
            None => exn::bail!(ErrorKind::NotFound(format!("commit {commit}"))),
        }
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        for entry in entries {
            self.check_failing(&entry.path)?;
        }
        let mut state = self.state.lock().await;
        state.land_interleaved()?;
        let Some(mut files) = state.trees.get(base_tree).cloned() else {
            exn::bail!(ErrorKind::NotFound(format!("tree {base_tree}")));
        };
        for entry in entries {
            match &entry.change {
                TreeChange::Upsert(content) => {
                    files.insert(entry.path.clone(), content.clone());
                },
                TreeChange::Remove => {
                    files.remove(&entry.path);
                },
            }
        }
        Ok(state.store_tree(files))
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let mut state = self.state.lock().await;
        if !state.trees.contains_key(tree) {
            exn::bail!(ErrorKind::NotFound(format!("tree {tree}")));
        }
        if let Some(missing) = parents.iter().find(|parent| !state.commits.contains_key(*parent)) {
            exn::bail!(ErrorKind::NotFound(format!("commit {missing}")));
        }
        Ok(state.store_commit(tree.to_string(), parents.to_vec(), message))
    }

    async fn update_ref(&self, branch: &str, commit: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let head = state.head(branch)?;
        if !state.commits.contains_key(commit) {
            exn::bail!(ErrorKind::NotFound(format!("commit {commit}")));
        }
        if !state.is_ancestor(&head, commit) {
            exn::bail!(ErrorKind::Conflict(format!("{branch} cannot be fast-forwarded to {commit}")));
        }
        state.refs.insert(branch.to_string(), commit.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> MockVcs {
        MockVcs::new().with_branch(
            "main",
            [("config/staging/a.json", "{\"a\":1}"), ("config/staging/b.json", "{\"b\":1}")],
        )
    }

    #[tokio::test]
    async fn test_get_file_reports_blob_sha() {
        let vcs = repository();
        let file = vcs.get_file("config/staging/a.json", "main").await.unwrap();
        assert_eq!(file.content, b"{\"a\":1}");
        assert_eq!(file.sha, blob_hash(b"{\"a\":1}"));

        let err = vcs.get_file("config/staging/missing.json", "main").await.unwrap_err();
        assert!(err.is_not_found());
        let err = vcs.get_file("config/staging", "main").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_exists_covers_directories() {
        let vcs = repository();
        assert!(vcs.exists("config", "main").await.unwrap());
        assert!(vcs.exists("config/staging", "main").await.unwrap());
        assert!(vcs.exists("config/staging/a.json", "main").await.unwrap());
        assert!(!vcs.exists("config/production", "main").await.unwrap());
        assert!(!vcs.exists("config/stag", "main").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_file_requires_matching_sha() {
        let vcs = repository();
        let err = vcs.put_file("config/staging/a.json", b"{}", "update", "main", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        let err = vcs.put_file("config/staging/a.json", b"{}", "update", "main", Some("0000")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));

        let sha = blob_hash(b"{\"a\":1}");
        let written = vcs.put_file("config/staging/a.json", b"{}", "update", "main", Some(&sha)).await.unwrap();
        assert_eq!(written, blob_hash(b"{}"));
        vcs.put_file("config/staging/c.json", b"[]", "create", "main", None).await.unwrap();
        assert_eq!(vcs.commit_messages("main").await, ["create", "update", "initial commit"]);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let vcs = repository();
        let sha = blob_hash(b"{\"b\":1}");
        vcs.delete_file("config/staging/b.json", "remove", &sha, "main").await.unwrap();
        assert!(vcs.file("main", "config/staging/b.json").await.is_none());
        let err = vcs.delete_file("config/staging/b.json", "remove", &sha, "main").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_batch_commit_fast_forwards() {
        let vcs = repository();
        let head = vcs.get_ref("main").await.unwrap();
        let tree = vcs.commit_tree(&head).await.unwrap();
        let entries = [TreeEntry::upsert("config/staging/a.json", "{}"), TreeEntry::remove("config/staging/b.json")];
        let tree = vcs.create_tree(&tree, &entries).await.unwrap();
        let commit = vcs.create_commit("batch", &tree, &[head]).await.unwrap();
        vcs.update_ref("main", &commit).await.unwrap();

        assert_eq!(vcs.paths("main").await, ["config/staging/a.json"]);
        assert_eq!(vcs.file("main", "config/staging/a.json").await.unwrap(), b"{}");
        assert_eq!(vcs.commit_messages("main").await, ["batch", "initial commit"]);
    }

    #[tokio::test]
    async fn test_interleaved_commit_rejects_stale_update() {
        let vcs = repository();
        let head = vcs.get_ref("main").await.unwrap();
        let tree = vcs.commit_tree(&head).await.unwrap();
        vcs.interleave_commit("main", "config/staging/z.json", "{}").await;
        let tree = vcs.create_tree(&tree, &[TreeEntry::upsert("config/staging/a.json", "{}")]).await.unwrap();
        let commit = vcs.create_commit("batch", &tree, &[head]).await.unwrap();

        let err = vcs.update_ref("main", &commit).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        assert_eq!(vcs.file("main", "config/staging/a.json").await.unwrap(), b"{\"a\":1}");
        assert!(vcs.file("main", "config/staging/z.json").await.is_some());
    }

    #[tokio::test]
    async fn test_failing_paths() {
        let vcs = repository().failing_on("config/staging/a.json");
        let err = vcs.put_file("config/staging/a.json", b"{}", "update", "main", None).await.unwrap_err();
        assert!(err.is_retryable());
        let head = vcs.get_ref("main").await.unwrap();
        let tree = vcs.commit_tree(&head).await.unwrap();
        let err = vcs.create_tree(&tree, &[TreeEntry::remove("config/staging/a.json")]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
