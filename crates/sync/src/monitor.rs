//! Monitor: where does every tracked file stand?
//!
//! Each tracked file is fingerprinted on every backend with SHA-256 and the
//! copies are reconciled. With a VCS backend this is the three-way
//! [`reconcile`]; without one the local tree and the object store are
//! [`compare`]d. Nothing is written.

use crate::context::Context;
use crate::decide::{Presence, Status, compare, reconcile};
use crate::error::{ClassifyExt, ErrorKind, Result};
use crate::record::{Backend, tracked_paths};
use crate::state;
use confsync_config::Environment;
use confsync_storage::fingerprint::Algorithm;

/// The state of one tracked file in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    pub environment: Environment,
    pub folder: String,
    pub file: String,
    pub local: Presence,
    pub object_store: Presence,
    /// `None` when no VCS backend is configured.
    pub vcs: Option<Presence>,
    pub status: Status,
}

/// Report on every tracked file of `environments`.
///
/// # Errors
/// A backend that can't be read makes the whole report unreliable, so the
/// first read failure is returned.
pub async fn monitor(ctx: &Context, environments: &[Environment]) -> Result<Vec<FileState>> {
    let mut states = Vec::new();
    for &environment in environments {
        for path in tracked_paths(&ctx.registry.folders, environment, None) {
            let local = state::read_storage(ctx.local.as_ref(), Backend::Local, &path.local, Algorithm::Sha256)
                .await
                .or_classify(ErrorKind::Storage)?;
            let object_store =
                state::read_storage(ctx.store.as_ref(), Backend::ObjectStore, &path.key, Algorithm::Sha256)
                    .await
                    .or_classify(ErrorKind::Storage)?;
            let local = Presence::from_hash(local.side.hash);
            let object_store = Presence::from_hash(object_store.side.hash);

            let (vcs, status) = match ctx.vcs.as_deref() {
                Some(vcs) => {
                    let hash = state::vcs_content_hash(vcs, &path.local, ctx.branch(environment))
                        .await
                        .or_classify(ErrorKind::Vcs)?;
                    let vcs = Presence::from_hash(hash);
                    let status = reconcile(&local, &object_store, &vcs);
                    (Some(vcs), status)
                },
                None => (None, compare(&local, &object_store)),
            };
            if status.needs_attention() {
                tracing::info!(%environment, folder = %path.folder, file = %path.file, %status, "File needs attention");
            }
            states.push(FileState {
                environment,
                folder: path.folder,
                file: path.file,
                local,
                object_store,
                vcs,
                status,
            });
        }
    }
    Ok(states)
}
