use crate::decide::Policy;
use crate::error::{ErrorKind, Result};
use crate::record::Backend;
use confsync_config::{Environment, Registry, SyncConfig};
use confsync_storage::BackendHandle;
use confsync_vcs::VcsHandle;
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per branch.
///
/// Held for the whole read-base, build, update-ref sequence so two writers in
/// this process never build on the same base commit.
#[derive(Default)]
pub struct RefLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefLocks {
    pub async fn lock(&self, branch: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().await.entry(branch.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}

/// Options shared by the bulk drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Only sync this folder.
    pub folder: Option<String>,
    /// Propagate deletions: remove destination files whose source is gone.
    pub prune: bool,
}

/// Everything a sync operation needs, built once per invocation and passed
/// down explicitly.
pub struct Context {
    pub config: SyncConfig,
    pub registry: Registry,
    /// The local configuration tree.
    pub local: BackendHandle,
    /// The object store (bucket root).
    pub store: BackendHandle,
    pub vcs: Option<VcsHandle>,
    pub ref_locks: RefLocks,
}

impl Context {
    /// Validate the registry and assemble a context.
    ///
    /// # Errors
    /// Returns [`ErrorKind::ConfigInvalid`] when the registry fails
    /// validation; no sync may run against an invalid registry.
    pub fn new(
        config: SyncConfig,
        registry: Registry,
        local: BackendHandle,
        store: BackendHandle,
        vcs: Option<VcsHandle>,
    ) -> Result<Self> {
        registry.validate().or_raise(|| ErrorKind::ConfigInvalid)?;
        Ok(Self {
            config,
            registry,
            local,
            store,
            vcs,
            ref_locks: RefLocks::default(),
        })
    }

    pub fn vcs(&self) -> Result<&VcsHandle> {
        self.vcs.as_ref().ok_or_raise(|| ErrorKind::NoVcs)
    }

    /// Branch that holds the files of `env`.
    pub fn branch(&self, env: Environment) -> &str {
        self.config.branches.for_env(env)
    }

    /// Decision policy for writes into `destination`.
    pub fn policy(&self, destination: Backend, propagate_deletes: bool) -> Policy {
        let window = time::Duration::seconds(i64::try_from(self.config.suppression_window).unwrap_or(i64::MAX));
        Policy::new(destination)
            .with_suppression_window(window)
            .with_deletes(propagate_deletes)
    }
}
