//! Backend construction from settings.

use crate::error::{ErrorKind, Result};
use confsync_config::SyncConfig;
use confsync_storage::BackendHandle;
use confsync_storage::backend::{LocalBackend, ReadOnlyBackend, S3Backend, S3Credentials};
use confsync_vcs::VcsHandle;
use confsync_vcs::backend::{GitHubBackend, ReadOnlyVcs};
use exn::{OptionExt, ResultExt};
use std::sync::Arc;

/// The local tree, rooted at the absolute form of `local_root`.
pub fn local(config: &SyncConfig, dry_run: bool) -> Result<BackendHandle> {
    let root = std::path::absolute(&config.local_root).or_raise(|| ErrorKind::Backend("local"))?;
    let backend: BackendHandle = Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Backend("local"))?);
    Ok(read_only(backend, dry_run))
}

pub async fn object_store(config: &SyncConfig, dry_run: bool) -> Result<BackendHandle> {
    let bucket = config.bucket().or_raise(|| ErrorKind::Backend("s3"))?;
    let store = &config.store;
    let credentials = S3Credentials {
        key_id: store.key_id.clone().ok_or_raise(|| ErrorKind::Backend("s3"))?,
        key_secret: store.key_secret.clone().ok_or_raise(|| ErrorKind::Backend("s3"))?,
        session_token: store.session_token.clone(),
    };
    let backend = S3Backend::new("s3", bucket, None, store.region.as_str(), store.endpoint.as_deref(), credentials)
        .await
        .or_raise(|| ErrorKind::Backend("s3"))?;
    tracing::debug!(bucket, region = %store.region, "Object store ready");
    Ok(read_only(Arc::new(backend), dry_run))
}

/// The repository backend, when a repository is configured.
pub fn vcs(config: &SyncConfig, dry_run: bool) -> Result<Option<VcsHandle>> {
    let Some((owner, repository)) = config.github.repository() else {
        tracing::debug!("No repository configured");
        return Ok(None);
    };
    let github = &config.github;
    let backend = GitHubBackend::new("github", &github.api_url, owner, repository, github.token.clone())
        .or_raise(|| ErrorKind::Backend("github"))?;
    let handle: VcsHandle = Arc::new(backend);
    if dry_run {
        return Ok(Some(Arc::new(ReadOnlyVcs::new(handle))));
    }
    Ok(Some(handle))
}

fn read_only(backend: BackendHandle, dry_run: bool) -> BackendHandle {
    if dry_run {
        Arc::new(ReadOnlyBackend::new(backend))
    } else {
        backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_storage::StorageBackend;

    #[test]
    fn test_local_root_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            local_root: dir.path().join("tree"),
            ..SyncConfig::default()
        };
        let backend = local(&config, false).unwrap();
        assert_eq!(backend.name(), "local");
        assert!(dir.path().join("tree").is_dir());
    }

    #[test]
    fn test_no_repository_means_no_vcs() {
        let config = SyncConfig::default();
        assert!(vcs(&config, false).unwrap().is_none());
    }

    #[test]
    fn test_repository_builds_vcs() {
        let mut config = SyncConfig::default();
        config.github.repository = Some("acme/configs".to_string());
        assert!(vcs(&config, true).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_object_store_needs_bucket() {
        let err = object_store(&SyncConfig::default(), false).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Backend("s3")));
    }
}
