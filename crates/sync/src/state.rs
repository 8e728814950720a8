//! Reading the current state of one file from a backend.

use crate::decide::Side;
use crate::error::ClassifyExt;
use crate::execute::error::{ErrorKind, Result};
use crate::provenance::Provenance;
use crate::record::Backend;
use confsync_storage::StorageBackend;
use confsync_storage::fingerprint::{Algorithm, content_hash, fingerprint};
use confsync_vcs::VcsBackend;
use std::path::Path;

/// A file as found on one backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub side: Side,
    pub content: Option<Vec<u8>>,
    /// Blob SHA of a VCS file.
    pub version: Option<String>,
}

impl Snapshot {
    fn absent() -> Self {
        Self::default()
    }
}

/// Read a file and its provenance from a storage backend, fingerprinting it
/// with `algorithm`. A missing file is an absent snapshot, not an error.
pub(crate) async fn read_storage(
    storage: &dyn StorageBackend,
    backend: Backend,
    path: &str,
    algorithm: Algorithm,
) -> Result<Snapshot> {
    match storage.get(Path::new(path)).await {
        Ok(object) => Ok(Snapshot {
            side: Side::present(fingerprint(algorithm, &object.data))
                .with_provenance(Provenance::read(&object.info.metadata)),
            content: Some(object.data),
            version: None,
        }),
        Err(e) if e.is_not_found() => Ok(Snapshot::absent()),
        Err(e) => Err(e).or_classify(|failure| ErrorKind::Read(backend, failure)),
    }
}

/// The object-store state used when pushing: the hash comes from the
/// `file-hash` tag, and the object is only downloaded when the tag is missing.
pub(crate) async fn read_tagged(store: &dyn StorageBackend, key: &str) -> Result<Snapshot> {
    let info = match store.stat(Path::new(key)).await {
        Ok(info) => info,
        Err(e) if e.is_not_found() => return Ok(Snapshot::absent()),
        Err(e) => return Err(e).or_classify(|failure| ErrorKind::Read(Backend::ObjectStore, failure)),
    };
    let provenance = Provenance::read(&info.metadata);
    if let Some(hash) = provenance.as_ref().and_then(|p| p.file_hash.clone()) {
        return Ok(Snapshot {
            side: Side::present(hash).with_provenance(provenance),
            ..Snapshot::default()
        });
    }
    tracing::debug!(key, "Object has no file-hash tag, hashing its content");
    read_storage(store, Backend::ObjectStore, key, Algorithm::Sha256).await
}

/// Read a file from `branch`, using the blob SHA as its fingerprint.
pub(crate) async fn read_vcs(vcs: &dyn VcsBackend, path: &str, branch: &str) -> Result<Snapshot> {
    match vcs.get_file(path, branch).await {
        Ok(file) => Ok(Snapshot {
            side: Side::present(file.sha.clone()),
            content: Some(file.content),
            version: Some(file.sha),
        }),
        Err(e) if e.is_not_found() => Ok(Snapshot::absent()),
        Err(e) => Err(e).or_classify(|failure| ErrorKind::Read(Backend::Vcs, failure)),
    }
}

/// SHA-256 of a VCS file, for comparisons against the other backends.
pub(crate) async fn vcs_content_hash(vcs: &dyn VcsBackend, path: &str, branch: &str) -> Result<Option<String>> {
    let snapshot = read_vcs(vcs, path, branch).await?;
    Ok(snapshot.content.map(|content| content_hash(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::FILE_HASH;
    use confsync_storage::Metadata;
    use confsync_storage::backend::MockBackend;
    use confsync_storage::fingerprint::blob_hash;

    #[tokio::test]
    async fn test_tag_hash_is_trusted() {
        let metadata = Metadata::from([(FILE_HASH.to_string(), "from-tag".to_string())]);
        let store = MockBackend::with_objects([("config/staging/a.json", b"{}".to_vec(), metadata)]);
        let snapshot = read_tagged(&store, "config/staging/a.json").await.unwrap();
        assert_eq!(snapshot.side.hash.as_deref(), Some("from-tag"));
        assert!(snapshot.content.is_none());
    }

    #[tokio::test]
    async fn test_untagged_object_is_hashed() {
        let store = MockBackend::with_files([("config/staging/a.json", b"{}".to_vec())]);
        let snapshot = read_tagged(&store, "config/staging/a.json").await.unwrap();
        assert_eq!(snapshot.side.hash, Some(content_hash(b"{}")));
        assert!(snapshot.side.provenance.is_none());
    }

    #[tokio::test]
    async fn test_missing_files_are_absent() {
        let store = MockBackend::default();
        let snapshot = read_tagged(&store, "config/staging/a.json").await.unwrap();
        assert!(!snapshot.side.exists);
        let snapshot = read_storage(&store, Backend::Local, "config/staging/a.json", Algorithm::Sha256).await.unwrap();
        assert!(!snapshot.side.exists);
    }

    #[tokio::test]
    async fn test_storage_fingerprint_follows_algorithm() {
        let store = MockBackend::with_files([("a/staging/x.json", b"[1]".to_vec())]);
        let snapshot = read_storage(&store, Backend::ObjectStore, "a/staging/x.json", Algorithm::GitBlob).await.unwrap();
        assert_eq!(snapshot.side.hash, Some(blob_hash(b"[1]")));
        assert_eq!(snapshot.content.as_deref(), Some(&b"[1]"[..]));
    }
}
