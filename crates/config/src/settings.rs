//! Runtime settings for a sync run.
//!
//! Settings are layered with [`figment`], lowest precedence first:
//!
//! 1. Built-in defaults (and `/tmp` as the local root inside AWS Lambda).
//! 2. `config.toml` in the user's configuration directory.
//! 3. `confsync.toml`, `confsync.yaml` or `confsync.json` in the working
//!    directory.
//! 4. An explicit configuration file.
//! 5. The legacy deployment variables (`S3_BUCKET`, `AWS_REGION`,
//!    `GITHUB_TOKEN`, ...).
//! 6. `CONFSYNC_`-prefixed variables, with `__` separating nested keys
//!    (`CONFSYNC_STORE__BUCKET`).
//!
//! This is the only place the process environment is consulted; everything
//! downstream receives a [`SyncConfig`] value.

use crate::Environment;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const LEGACY_VARIABLES: [&str; 10] = [
    "S3_BUCKET",
    "AWS_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GITHUB_TOKEN",
    "GITHUB_REPO",
    "GITHUB_REPOSITORY",
    "GITHUB_SHA",
    "SYNC_SOURCE",
];

fn legacy_key(variable: &str) -> &'static str {
    match variable.to_ascii_uppercase().as_str() {
        "S3_BUCKET" => "store.bucket",
        "AWS_REGION" => "store.region",
        "AWS_ACCESS_KEY_ID" => "store.key_id",
        "AWS_SECRET_ACCESS_KEY" => "store.key_secret",
        "AWS_SESSION_TOKEN" => "store.session_token",
        "GITHUB_TOKEN" => "github.token",
        "GITHUB_REPO" | "GITHUB_REPOSITORY" => "github.repository",
        "GITHUB_SHA" => "commit_sha",
        "SYNC_SOURCE" => "sync_source",
        _ => "unmapped",
    }
}

/// Object-store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub session_token: Option<String>,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "ap-southeast-2".to_string(),
            endpoint: None,
            key_id: None,
            key_secret: None,
            session_token: None,
        }
    }
}

/// VCS host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// `owner/repo`
    pub repository: Option<String>,
    pub token: Option<String>,
    pub api_url: String,
}
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}
impl GitHubConfig {
    /// The configured repository split into `(owner, repo)`.
    pub fn repository(&self) -> Option<(&str, &str)> {
        self.repository
            .as_deref()
            .and_then(|r| r.split_once('/'))
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
    }
}

/// Which VCS branch holds each environment's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branches {
    pub staging: String,
    pub production: String,
}
impl Default for Branches {
    fn default() -> Self {
        Self {
            staging: "staging".to_string(),
            production: "main".to_string(),
        }
    }
}
impl Branches {
    pub fn for_env(&self, env: Environment) -> &str {
        match env {
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }
}

/// Everything a sync run needs besides the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Path to the folder registry (`folders.json`).
    pub registry: PathBuf,
    /// Directory the registry's local paths are relative to.
    pub local_root: PathBuf,
    pub store: StoreConfig,
    pub github: GitHubConfig,
    pub branches: Branches,
    /// Seconds after a sync during which changes are assumed to be echoes.
    pub suppression_window: u64,
    /// Identifier written as `synced-from`; defaults to `github-{env}`.
    pub sync_source: Option<String>,
    /// Commit that triggered this run, recorded in provenance tags.
    pub commit_sha: Option<String>,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("config/folders.json"),
            local_root: PathBuf::from("."),
            store: StoreConfig::default(),
            github: GitHubConfig::default(),
            branches: Branches::default(),
            suppression_window: 300,
            sync_source: None,
            commit_sha: None,
        }
    }
}

impl SyncConfig {
    /// The layered [`Figment`] this configuration is extracted from.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(SyncConfig::default()));
        if Env::var("AWS_LAMBDA_FUNCTION_NAME").is_some() {
            figment = figment.merge(Serialized::default("local_root", "/tmp"));
        }
        if let Some(dirs) = ProjectDirs::from("", "", "confsync") {
            figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
        }
        figment = figment
            .merge(Toml::file("confsync.toml"))
            .merge(Yaml::file("confsync.yaml"))
            .merge(Json::file("confsync.json"));
        if let Some(path) = explicit {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment
            .merge(Env::raw().only(&LEGACY_VARIABLES).map(|key| legacy_key(key.as_str()).into()))
            .merge(Env::prefixed("CONFSYNC_").split("__"))
    }

    /// Load settings from every layer.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit
            && !path.is_file()
        {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let config: Self = Self::figment(explicit).extract().or_raise(|| ErrorKind::Settings)?;
        tracing::debug!(
            registry = %config.registry.display(),
            local_root = %config.local_root.display(),
            bucket = %config.store.bucket,
            "Loaded runtime settings"
        );
        Ok(config)
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_secs(self.suppression_window)
    }

    /// Value for the `synced-from` tag when pushing `env`.
    pub fn sync_source(&self, env: Environment) -> String {
        self.sync_source.clone().unwrap_or_else(|| format!("github-{env}"))
    }

    /// The bucket name, which is required for any object-store access.
    pub fn bucket(&self) -> Result<&str> {
        if self.store.bucket.trim().is_empty() {
            exn::bail!(ErrorKind::MissingSetting("store.bucket"));
        }
        Ok(&self.store.bucket)
    }
}
