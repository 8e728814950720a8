use crate::provenance::Provenance;
use confsync_config::{Environment, Folder};
use derive_more::Display;

/// One of the three places a configuration file can live.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    #[display("local")]
    Local,
    #[display("object-store")]
    ObjectStore,
    #[display("vcs")]
    Vcs,
}

impl Backend {
    /// Identifier this backend's system is known by in provenance tags.
    ///
    /// The local tree is a checkout of the VCS repository, so both share one.
    pub fn system(&self) -> &'static str {
        match self {
            Self::Local | Self::Vcs => "github",
            Self::ObjectStore => "s3",
        }
    }
}

/// Everything needed to apply one decision to one file.
///
/// Built per event or per tracked file and dropped afterwards.
#[derive(Debug, Clone)]
pub struct SyncRecord {
    pub environment: Environment,
    pub folder: String,
    pub file: String,
    pub source: Backend,
    pub destination: Backend,
    /// Source content; absent when the source does not exist.
    pub content: Option<Vec<u8>>,
    /// SHA-256 of `content`.
    pub content_hash: Option<String>,
    pub provenance: Option<Provenance>,
    /// Key, repository path or local path (relative to the local root).
    pub destination_path: String,
    /// Blob SHA of the existing VCS file, required to update or delete it.
    pub destination_version: Option<String>,
    /// Environment the content was copied from, when it is not `environment`.
    pub copied_from: Option<Environment>,
}

impl SyncRecord {
    pub fn new(
        environment: Environment,
        folder: impl Into<String>,
        file: impl Into<String>,
        source: Backend,
        destination: Backend,
        destination_path: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            folder: folder.into(),
            file: file.into(),
            source,
            destination,
            content: None,
            content_hash: None,
            provenance: None,
            destination_path: destination_path.into(),
            destination_version: None,
            copied_from: None,
        }
    }

    /// Attach the source content, hashing it with SHA-256.
    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content_hash = Some(confsync_storage::fingerprint::content_hash(&content));
        self.content = Some(content);
        self
    }

    pub fn with_provenance(mut self, provenance: Option<Provenance>) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_destination_version(mut self, version: Option<String>) -> Self {
        self.destination_version = version;
        self
    }

    pub fn copied_from(mut self, environment: Environment) -> Self {
        self.copied_from = Some(environment);
        self
    }
}

/// One tracked file of one folder, with its locations for an environment.
#[derive(Debug, Clone)]
pub(crate) struct TrackedPath {
    pub folder: String,
    pub file: String,
    /// Object key.
    pub key: String,
    /// Path under the local root, which is also the repository path.
    pub local: String,
}

/// Every tracked file of `environment`, restricted to `only` when given.
pub(crate) fn tracked_paths<'a>(
    folders: impl IntoIterator<Item = &'a Folder>,
    environment: Environment,
    only: Option<&str>,
) -> Vec<TrackedPath> {
    folders
        .into_iter()
        .filter(|folder| only.is_none_or(|name| folder.name == name))
        .flat_map(|folder| {
            folder.files.iter().filter_map(move |file| {
                Some(TrackedPath {
                    folder: folder.name.clone(),
                    file: file.name.clone(),
                    key: folder.object_key(environment, &file.name)?,
                    local: folder.local_file(environment, &file.name)?,
                })
            })
        })
        .collect()
}
