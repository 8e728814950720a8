//! The folder registry: which files are tracked, and where each environment's
//! copy lives locally and in the object store.
//!
//! The registry is a JSON document (`folders.json`) with a `folders` array.
//! Any other top-level keys are carried through untouched so that saving a
//! mutated registry never drops information this crate doesn't understand.

use crate::Environment;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

/// Only files with this suffix are ever monitored or synced.
pub const MONITORED_SUFFIX: &str = ".json";

/// A single tracked JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A group of tracked files sharing a local directory and object-store prefix
/// per environment.
///
/// Per-environment fields take precedence; the unified `local_path` and
/// `s3_prefix` fields are the legacy layout where the environment is appended
/// as the final path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path_staging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path_production: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix_staging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix_production: Option<String>,
    #[serde(default)]
    pub files: Vec<TrackedFile>,
}

impl Folder {
    /// Object-store prefix for `env`, without a trailing slash.
    pub fn s3_prefix(&self, env: Environment) -> Option<Cow<'_, str>> {
        let explicit = match env {
            Environment::Staging => self.s3_prefix_staging.as_deref(),
            Environment::Production => self.s3_prefix_production.as_deref(),
        };
        per_environment(explicit, self.s3_prefix.as_deref(), env)
    }

    /// Local directory (relative to the local root) for `env`.
    pub fn local_path(&self, env: Environment) -> Option<Cow<'_, str>> {
        let explicit = match env {
            Environment::Staging => self.local_path_staging.as_deref(),
            Environment::Production => self.local_path_production.as_deref(),
        };
        per_environment(explicit, self.local_path.as_deref(), env)
    }

    /// First path segment of the object-store prefix for `env`.
    pub fn prefix_base(&self, env: Environment) -> Option<String> {
        self.s3_prefix(env).and_then(|prefix| prefix.split('/').next().map(str::to_string))
    }

    /// Object key of `file` for `env`.
    pub fn object_key(&self, env: Environment, file: &str) -> Option<String> {
        self.s3_prefix(env).map(|prefix| format!("{prefix}/{file}"))
    }

    /// Local path (relative to the local root) of `file` for `env`.
    pub fn local_file(&self, env: Environment, file: &str) -> Option<String> {
        self.local_path(env).map(|dir| format!("{}/{file}", dir.trim_end_matches('/')))
    }

    pub fn file(&self, name: &str) -> Option<&TrackedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn tracks(&self, name: &str) -> bool {
        self.file(name).is_some()
    }
}

fn per_environment<'a>(explicit: Option<&'a str>, legacy: Option<&'a str>, env: Environment) -> Option<Cow<'a, str>> {
    match (explicit, legacy) {
        (Some(value), _) => Some(Cow::Borrowed(value.trim_end_matches('/'))),
        (None, Some(base)) => Some(Cow::Owned(format!("{}/{env}", base.trim_end_matches('/')))),
        (None, None) => None,
    }
}

/// One monitored object-store location, as it would be configured as an
/// event notification filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredPrefix {
    /// Prefix including its trailing slash.
    pub prefix: String,
    pub environment: Environment,
    pub folder: String,
}

/// The full registry document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// Load a registry from a JSON file.
    ///
    /// The registry is not validated here; call [`validate`](Self::validate)
    /// before using it for a sync run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(path.to_path_buf())),
        };
        let registry: Self = serde_json::from_slice(&data).or_raise(|| ErrorKind::Malformed(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), folders = registry.folders.len(), "Loaded folder registry");
        Ok(registry)
    }

    /// Write the registry back as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut data = serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Malformed(path.to_path_buf()))?;
        data.push(b'\n');
        std::fs::write(path, data).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Saved folder registry");
        Ok(())
    }

    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Every configured object-store prefix, in registry order.
    pub fn monitored_prefixes(&self) -> Vec<MonitoredPrefix> {
        self.folders
            .iter()
            .flat_map(|folder| {
                Environment::ALL.into_iter().filter_map(move |env| {
                    folder.s3_prefix(env).map(|prefix| MonitoredPrefix {
                        prefix: format!("{prefix}/"),
                        environment: env,
                        folder: folder.name.clone(),
                    })
                })
            })
            .collect()
    }

    /// Total number of tracked files across all folders.
    pub fn file_count(&self) -> usize {
        self.folders.iter().map(|f| f.files.len()).sum()
    }

    /// Register a new folder using the legacy unified layout: local files live
    /// under `{local_base}/{name}/{env}` and objects under `{s3_prefix}/{env}`.
    pub fn add_folder(&mut self, name: &str, description: &str, s3_prefix: &str, local_base: &str) -> Result<()> {
        if self.folder(name).is_some() {
            exn::bail!(ErrorKind::FolderExists(name.to_string()));
        }
        self.folders.push(Folder {
            name: name.to_string(),
            description: description.to_string(),
            local_path: Some(format!("{}/{name}", local_base.trim_end_matches('/'))),
            local_path_staging: None,
            local_path_production: None,
            s3_prefix: Some(s3_prefix.trim_end_matches('/').to_string()),
            s3_prefix_staging: None,
            s3_prefix_production: None,
            files: Vec::new(),
        });
        Ok(())
    }

    /// Start tracking `file` in `folder`.
    pub fn add_file(&mut self, folder: &str, file: &str, description: &str) -> Result<()> {
        if !file.ends_with(MONITORED_SUFFIX) || file.contains('/') {
            exn::bail!(ErrorKind::InvalidFileName(file.to_string()));
        }
        let entry = self
            .folders
            .iter_mut()
            .find(|f| f.name == folder)
            .ok_or_else(|| exn::Exn::from(ErrorKind::FolderNotFound(folder.to_string())))?;
        if entry.tracks(file) {
            exn::bail!(ErrorKind::FileExists(folder.to_string(), file.to_string()));
        }
        entry.files.push(TrackedFile {
            name: file.to_string(),
            description: description.to_string(),
        });
        Ok(())
    }
}
