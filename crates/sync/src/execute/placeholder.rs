//! Placeholder files for missing VCS directories.
//!
//! Git cannot track an empty directory, so before the first file lands in a
//! new directory a throwaway `README.md` is committed into every missing
//! parent. The placeholders are removed again once the real file exists.

use crate::error::ClassifyExt;
use crate::execute::error::{ErrorKind, Result};
use confsync_vcs::VcsBackend;

pub(crate) const PLACEHOLDER: &str = "README.md";

const CONTENT: &[u8] = b"Directory placeholder for synced configuration files.\n";

/// A placeholder that was committed, with the blob SHA needed to remove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub path: String,
    pub sha: String,
}

/// Every parent directory of `path`, outermost first.
fn parents(path: &str) -> Vec<&str> {
    path.match_indices('/').map(|(i, _)| &path[..i]).filter(|dir| !dir.is_empty()).collect()
}

/// Create a placeholder in each parent directory of `path` missing on `branch`.
/// On failure the placeholders already committed are removed again.
pub(crate) async fn create(vcs: &dyn VcsBackend, path: &str, branch: &str) -> Result<Vec<Placeholder>> {
    let mut created = Vec::new();
    for dir in parents(path) {
        // Once one directory is missing all of its children are too.
        if created.is_empty()
            && vcs
                .exists(dir, branch)
                .await
                .or_classify(|failure| ErrorKind::Placeholder(dir.to_string(), failure))?
        {
            continue;
        }
        let placeholder = format!("{dir}/{PLACEHOLDER}");
        let message = format!("chore: create {placeholder} for directory placeholder");
        let sha = match vcs
            .put_file(&placeholder, CONTENT, &message, branch, None)
            .await
            .or_classify(|failure| ErrorKind::Placeholder(placeholder.clone(), failure))
        {
            Ok(sha) => sha,
            Err(e) => {
                remove(vcs, &created, branch).await;
                return Err(e);
            },
        };
        tracing::debug!(path = %placeholder, branch, "Created directory placeholder");
        created.push(Placeholder { path: placeholder, sha });
    }
    Ok(created)
}

/// Remove placeholders, innermost first. Failures are logged and ignored: a
/// leftover README is harmless.
pub(crate) async fn remove(vcs: &dyn VcsBackend, placeholders: &[Placeholder], branch: &str) {
    for placeholder in placeholders.iter().rev() {
        let message = format!("chore: remove placeholder {}", placeholder.path);
        match vcs.delete_file(&placeholder.path, &message, &placeholder.sha, branch).await {
            Ok(()) => tracing::debug!(path = %placeholder.path, branch, "Removed directory placeholder"),
            Err(e) => tracing::warn!(path = %placeholder.path, branch, error = ?e, "Could not remove placeholder"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_vcs::backend::MockVcs;
    use rstest::rstest;

    #[rstest]
    #[case("a.json", &[])]
    #[case("config/a.json", &["config"])]
    #[case("config/staging/a.json", &["config", "config/staging"])]
    fn test_parents(#[case] path: &str, #[case] expected: &[&str]) {
        assert_eq!(parents(path), expected);
    }

    #[tokio::test]
    async fn test_creates_only_missing_directories() {
        let vcs = MockVcs::new().with_branch("main", [("config/staging/a.json", "{}")]);
        let created = create(&vcs, "config/production/a.json", "main").await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].path, "config/production/README.md");
        assert!(vcs.file("main", "config/production/README.md").await.is_some());

        remove(&vcs, &created, "main").await;
        assert!(vcs.file("main", "config/production/README.md").await.is_none());
        assert_eq!(
            vcs.commit_messages("main").await,
            [
                "chore: remove placeholder config/production/README.md",
                "chore: create config/production/README.md for directory placeholder",
                "initial commit",
            ]
        );
    }

    #[tokio::test]
    async fn test_nested_missing_directories() {
        let vcs = MockVcs::new().with_branch("main", [("README.md", "root")]);
        let created = create(&vcs, "flags/staging/a.json", "main").await.unwrap();
        let paths: Vec<_> = created.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["flags/README.md", "flags/staging/README.md"]);
        remove(&vcs, &created, "main").await;
        assert_eq!(vcs.paths("main").await, ["README.md"]);
    }

    #[tokio::test]
    async fn test_failed_create_removes_earlier_placeholders() {
        let vcs = MockVcs::new()
            .with_branch("main", [("README.md", "root")])
            .failing_on("flags/staging/README.md");
        let err = create(&vcs, "flags/staging/a.json", "main").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Placeholder(path, _) if path == "flags/staging/README.md"));
        assert!(vcs.file("main", "flags/README.md").await.is_none());
        assert_eq!(vcs.paths("main").await, ["README.md"]);
    }
}
