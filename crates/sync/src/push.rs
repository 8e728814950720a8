//! Push: local tree to object store.
//!
//! Every tracked file of one environment is uploaded when its content differs
//! from the `file-hash` tag on the stored object. A production file missing
//! from the local tree but present in staging is first copied into the
//! production tree, and the upload records where it was copied from.

use crate::context::{Context, SyncOptions};
use crate::error::{ClassifyExt, ErrorKind, Result};
use crate::execute::Executor;
use crate::execute::error::{ErrorKind as ExecuteErrorKind, Result as ExecuteResult};
use crate::record::{Backend, SyncRecord, TrackedPath, tracked_paths};
use crate::report::{FileReport, SyncEvent};
use crate::state::{self, Snapshot};
use async_stream::stream;
use confsync_config::Environment;
use confsync_storage::Metadata;
use confsync_storage::error::Failure;
use confsync_storage::fingerprint::Algorithm;
use futures::Stream;
use std::path::Path;

/// Push every tracked file of `environment` to the object store.
pub fn push<'a>(
    ctx: &'a Context,
    environment: Environment,
    options: SyncOptions,
) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        yield Ok(SyncEvent::Started);
        let targets = tracked_paths(&ctx.registry.folders, environment, options.folder.as_deref());
        yield Ok(SyncEvent::DiscoveryComplete(u64::try_from(targets.len()).unwrap_or(u64::MAX)));
        for target in targets {
            yield Ok(SyncEvent::File(push_file(ctx, environment, &target, options.prune).await));
        }
        yield Ok(SyncEvent::Complete);
    })
}

#[tracing::instrument(skip_all, fields(%environment, folder = %target.folder, file = %target.file))]
async fn push_file(ctx: &Context, environment: Environment, target: &TrackedPath, prune: bool) -> FileReport {
    match try_push_file(ctx, environment, target, prune).await {
        Ok(report) => report,
        Err(e) => FileReport::failed(environment, target.key.as_str(), e.failure(), e.to_string()),
    }
}

async fn try_push_file(
    ctx: &Context,
    environment: Environment,
    target: &TrackedPath,
    prune: bool,
) -> ExecuteResult<FileReport> {
    let (source, copied_from) = read_local(ctx, environment, target).await?;
    if let Some(content) = &source.content
        && serde_json::from_slice::<serde_json::Value>(content).is_err()
    {
        let message = ErrorKind::InvalidJson(target.local.clone()).to_string();
        return Ok(FileReport::failed(environment, target.key.as_str(), Failure::Fatal, message));
    }
    let destination = state::read_tagged(ctx.store.as_ref(), &target.key).await?;
    let mut record = SyncRecord::new(
        environment,
        target.folder.as_str(),
        target.file.as_str(),
        Backend::Local,
        Backend::ObjectStore,
        target.key.as_str(),
    );
    if let Some(from) = copied_from {
        record = record.copied_from(from);
    }
    let policy = ctx.policy(Backend::ObjectStore, prune);
    Ok(Executor::new(ctx).sync(record, source, destination, &policy).await)
}

/// The local copy of a file, falling back to the staging copy for production.
async fn read_local(
    ctx: &Context,
    environment: Environment,
    target: &TrackedPath,
) -> ExecuteResult<(Snapshot, Option<Environment>)> {
    let local = ctx.local.as_ref();
    let snapshot = state::read_storage(local, Backend::Local, &target.local, Algorithm::Sha256).await?;
    if snapshot.side.exists || environment != Environment::Production {
        return Ok((snapshot, None));
    }
    let Some(staging) = ctx
        .registry
        .folder(&target.folder)
        .and_then(|folder| folder.local_file(Environment::Staging, &target.file))
    else {
        return Ok((snapshot, None));
    };
    let fallback = state::read_storage(local, Backend::Local, &staging, Algorithm::Sha256).await?;
    let Some(content) = &fallback.content else {
        return Ok((snapshot, None));
    };
    tracing::info!(from = %staging, to = %target.local, "Production file missing, copying from staging");
    local
        .write(Path::new(&target.local), content, &Metadata::new())
        .await
        .or_classify(|failure| ExecuteErrorKind::Write(Backend::Local, failure))?;
    Ok((fallback, Some(Environment::Staging)))
}
