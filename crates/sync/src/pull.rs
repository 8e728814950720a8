//! Pull: object store to VCS.
//!
//! Unlike the event handler, a pull publishes everything it changes on a
//! branch as one commit. Either every change in the run lands or none does;
//! when the commit fails, each file that was part of it is reported failed.

use crate::context::{Context, SyncOptions};
use crate::decide::{Action, Decision, decide};
use crate::error::{ClassifyExt, ErrorKind, Result};
use crate::execute::error::{ErrorKind as ExecuteErrorKind, Result as ExecuteResult};
use crate::execute::{BatchCommit, Outcome};
use crate::record::{Backend, TrackedPath, tracked_paths};
use crate::report::{FileReport, Skipped, SyncEvent};
use crate::resolve::resolve;
use crate::state;
use async_stream::stream;
use confsync_config::{Environment, MONITORED_SUFFIX};
use confsync_storage::backend::{StorageBackend, SuffixFilterBackend};
use confsync_storage::fingerprint::Algorithm;
use confsync_storage::path_to_key;
use confsync_vcs::{TreeEntry, VcsBackend};
use exn::OptionExt;
use futures::Stream;
use std::path::Path;
use time::OffsetDateTime;

/// Pull every tracked file of `environment` into its branch.
///
/// Objects found under a folder's prefix that the registry doesn't track are
/// reported as skipped. Listing the prefixes is all-or-nothing: a failed
/// listing ends the stream before anything is written.
pub fn pull<'a>(
    ctx: &'a Context,
    environment: Environment,
    options: SyncOptions,
) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        yield Ok(SyncEvent::Started);
        let vcs = match ctx.vcs() {
            Ok(vcs) => vcs,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let untracked = match untracked_objects(ctx, environment, options.folder.as_deref()).await {
            Ok(keys) => keys,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let paths = tracked_paths(&ctx.registry.folders, environment, options.folder.as_deref());
        yield Ok(SyncEvent::DiscoveryComplete(u64::try_from(paths.len() + untracked.len()).unwrap_or(u64::MAX)));

        for key in untracked {
            tracing::info!(%key, "Ignoring untracked object");
            yield Ok(SyncEvent::File(FileReport::skipped(Some(environment), key, Skipped::Untracked)));
        }

        let mut entries = Vec::new();
        let mut pending = Vec::new();
        for path in paths {
            match plan(ctx, vcs.as_ref(), environment, &path, options.prune).await {
                Ok((decision, None)) => {
                    let skipped = Skipped::Decision(decision.reason);
                    yield Ok(SyncEvent::File(FileReport::skipped(Some(environment), path.local, skipped)));
                },
                Ok((decision, Some(entry))) => {
                    entries.push(entry);
                    pending.push((path.local, outcome(decision.action)));
                },
                Err(e) => {
                    yield Ok(SyncEvent::File(FileReport::failed(environment, path.local, e.failure(), e.to_string())));
                },
            }
        }

        let mut batch = BatchCommit::new(
            ctx.branch(environment),
            format!("Sync {} files from S3 ({environment})", entries.len()),
        );
        for entry in entries {
            batch.push(entry);
        }
        match batch.commit(vcs.as_ref(), &ctx.ref_locks).await {
            Ok(_) => {
                for (path, outcome) in pending {
                    yield Ok(SyncEvent::File(FileReport::applied(environment, path, outcome)));
                }
            },
            Err(e) => {
                tracing::warn!(branch = batch.branch(), files = pending.len(), error = ?e, "Batch commit failed");
                for (path, _) in pending {
                    yield Ok(SyncEvent::File(FileReport::failed(environment, path, e.failure(), e.to_string())));
                }
            },
        }
        yield Ok(SyncEvent::Complete);
    })
}

fn outcome(action: Action) -> Outcome {
    match action {
        Action::Create => Outcome::Created,
        Action::Delete => Outcome::Deleted,
        _ => Outcome::Updated,
    }
}

/// Decide on one file and turn the decision into a tree entry, if it changes
/// anything.
#[tracing::instrument(skip_all, fields(%environment, folder = %path.folder, file = %path.file))]
async fn plan(
    ctx: &Context,
    vcs: &dyn VcsBackend,
    environment: Environment,
    path: &TrackedPath,
    prune: bool,
) -> ExecuteResult<(Decision, Option<TreeEntry>)> {
    let source = state::read_storage(ctx.store.as_ref(), Backend::ObjectStore, &path.key, Algorithm::GitBlob).await?;
    let destination = state::read_vcs(vcs, &path.local, ctx.branch(environment)).await?;
    let policy = ctx.policy(Backend::Vcs, prune);
    let decision = decide(&source.side, &destination.side, &policy, OffsetDateTime::now_utc());
    tracing::debug!(action = %decision.action, reason = %decision.reason, "Decided");
    let entry = match decision.action {
        Action::Skip => None,
        Action::Delete => Some(TreeEntry::remove(path.local.as_str())),
        Action::Create | Action::Update => {
            let content = source.content.ok_or_raise(|| ExecuteErrorKind::MissingContent)?;
            Some(TreeEntry::upsert(path.local.as_str(), content))
        },
    };
    Ok((decision, entry))
}

/// Keys of JSON objects under the monitored prefixes that resolve to no
/// tracked file.
async fn untracked_objects(ctx: &Context, environment: Environment, only: Option<&str>) -> Result<Vec<String>> {
    let store = SuffixFilterBackend::new(ctx.store.clone(), MONITORED_SUFFIX);
    let mut untracked = Vec::new();
    for folder in ctx.registry.folders.iter().filter(|f| only.is_none_or(|name| f.name == name)) {
        let Some(prefix) = folder.s3_prefix(environment) else {
            continue;
        };
        let listing = store
            .list(Some(Path::new(prefix.as_ref())))
            .await
            .or_classify(ErrorKind::Storage)?;
        for info in listing {
            let key = path_to_key(&info.path).or_classify(ErrorKind::Storage)?;
            if !resolve(&ctx.registry, &key).is_monitored() {
                untracked.push(key);
            }
        }
    }
    Ok(untracked)
}
