//! Mirror: object store to local tree.

use crate::context::{Context, SyncOptions};
use crate::error::Result;
use crate::execute::Executor;
use crate::execute::error::Result as ExecuteResult;
use crate::record::{Backend, SyncRecord, TrackedPath, tracked_paths};
use crate::report::{FileReport, SyncEvent};
use crate::state;
use async_stream::stream;
use confsync_config::Environment;
use confsync_storage::fingerprint::Algorithm;
use futures::Stream;

/// Bring the local copy of every tracked file of `environment` in line with
/// the object store.
pub fn mirror<'a>(
    ctx: &'a Context,
    environment: Environment,
    options: SyncOptions,
) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        yield Ok(SyncEvent::Started);
        let paths = tracked_paths(&ctx.registry.folders, environment, options.folder.as_deref());
        yield Ok(SyncEvent::DiscoveryComplete(u64::try_from(paths.len()).unwrap_or(u64::MAX)));
        for path in paths {
            let report = match mirror_file(ctx, environment, &path, options.prune).await {
                Ok(report) => report,
                Err(e) => FileReport::failed(environment, path.local.as_str(), e.failure(), e.to_string()),
            };
            yield Ok(SyncEvent::File(report));
        }
        yield Ok(SyncEvent::Complete);
    })
}

#[tracing::instrument(skip_all, fields(%environment, folder = %path.folder, file = %path.file))]
async fn mirror_file(
    ctx: &Context,
    environment: Environment,
    path: &TrackedPath,
    prune: bool,
) -> ExecuteResult<FileReport> {
    let source = state::read_storage(ctx.store.as_ref(), Backend::ObjectStore, &path.key, Algorithm::Sha256).await?;
    let destination = state::read_storage(ctx.local.as_ref(), Backend::Local, &path.local, Algorithm::Sha256).await?;
    let record = SyncRecord::new(
        environment,
        path.folder.as_str(),
        path.file.as_str(),
        Backend::ObjectStore,
        Backend::Local,
        path.local.as_str(),
    );
    // Local writes raise no object-store events, so nothing can echo back.
    let policy = ctx.policy(Backend::Local, prune).with_provenance_guard(false);
    Ok(Executor::new(ctx).sync(record, source, destination, &policy).await)
}
