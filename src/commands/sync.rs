//! `push`, `pull` and `mirror`.

use crate::cli::SyncArgs;
use crate::error::{ErrorKind, Result};
use confsync_sync::{Context, FileStatus, Summary, SyncEvent};
use exn::ResultExt;
use futures::Stream;

pub async fn push(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let mut summary = Summary::default();
    for environment in args.env.environments() {
        tracing::info!(%environment, "Pushing local files to the object store");
        drain(&mut summary, confsync_sync::push(ctx, environment, args.options()), "push").await?;
    }
    finish(&summary)
}

pub async fn pull(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let mut summary = Summary::default();
    for environment in args.env.environments() {
        tracing::info!(%environment, branch = ctx.branch(environment), "Pulling objects into the repository");
        drain(&mut summary, confsync_sync::pull(ctx, environment, args.options()), "pull").await?;
    }
    finish(&summary)
}

pub async fn mirror(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let mut summary = Summary::default();
    for environment in args.env.environments() {
        tracing::info!(%environment, "Mirroring objects into the local tree");
        drain(&mut summary, confsync_sync::mirror(ctx, environment, args.options()), "mirror").await?;
    }
    finish(&summary)
}

/// Collect one run into `summary`.
pub(super) async fn drain(
    summary: &mut Summary,
    events: impl Stream<Item = confsync_sync::error::Result<SyncEvent>>,
    operation: &'static str,
) -> Result<()> {
    let run = Summary::collect(events).await.or_raise(|| ErrorKind::Aborted(operation))?;
    summary.files.extend(run.files);
    Ok(())
}

/// Print the summary; any failed file fails the command.
pub(super) fn finish(summary: &Summary) -> Result<()> {
    println!(
        "{} synced, {} skipped, {} failed",
        summary.succeeded(),
        summary.skipped(),
        summary.failed()
    );
    for report in summary.failures() {
        if let FileStatus::Failed { failure, message } = &report.status {
            println!("  FAILED {} ({failure}): {message}", report.path);
        }
    }
    if summary.has_failures() {
        exn::bail!(ErrorKind::FilesFailed(summary.failed()));
    }
    Ok(())
}
