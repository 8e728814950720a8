//! Object-store event handlers.
//!
//! A notification names keys that changed; it says nothing reliable about
//! their current state. Each record is therefore resolved against the registry
//! and then re-read, so a late or replayed event (a removal for an object that
//! has since been re-created, say) is processed from what the bucket holds
//! now. Deletes always propagate here.

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::execute::Executor;
use crate::execute::error::{ErrorKind as ExecuteErrorKind, Result as ExecuteResult};
use crate::record::{Backend, SyncRecord};
use crate::report::{FileReport, Skipped, SyncEvent};
use crate::resolve::{PathInfo, Unmonitored, decode_key, resolve};
use crate::state;
use async_stream::stream;
use confsync_storage::fingerprint::Algorithm;
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use futures::Stream;
use serde::Deserialize;

/// An object-store event notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: String,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectEntity {
    /// Still URL-encoded, as delivered.
    pub key: String,
}

/// Parse an event payload.
pub fn parse_event(data: &[u8]) -> Result<S3Event> {
    serde_json::from_slice(data).or_raise(|| ErrorKind::InvalidEvent)
}

/// Where object-store changes are applied.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    #[display("github")]
    Vcs,
    #[display("local")]
    Local,
}

impl Target {
    pub fn destination(&self) -> Backend {
        match self {
            Self::Vcs => Backend::Vcs,
            Self::Local => Backend::Local,
        }
    }
}

/// Apply every record of `event` to `target`, one [`SyncEvent::File`] per
/// record.
///
/// Only a missing VCS backend (for [`Target::Vcs`]) ends the stream early;
/// a record that fails is reported and the next one is processed.
pub fn handle<'a>(ctx: &'a Context, event: &'a S3Event, target: Target) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        yield Ok(SyncEvent::Started);
        if target == Target::Vcs
            && let Err(e) = ctx.vcs()
        {
            yield Err(e);
            return;
        }
        yield Ok(SyncEvent::DiscoveryComplete(u64::try_from(event.records.len()).unwrap_or(u64::MAX)));
        for record in &event.records {
            yield Ok(SyncEvent::File(handle_record(ctx, record, target).await));
        }
        yield Ok(SyncEvent::Complete);
    })
}

#[tracing::instrument(skip_all, fields(event = %record.event_name, %target))]
async fn handle_record(ctx: &Context, record: &EventRecord, target: Target) -> FileReport {
    let key = decode_key(&record.s3.object.key);
    let bucket = &record.s3.bucket.name;
    let configured = ctx.config.store.bucket.as_str();
    if !configured.is_empty() && bucket != configured {
        tracing::info!(%key, %bucket, "Ignoring event for another bucket");
        return FileReport::skipped(None, key, Skipped::OtherBucket(bucket.clone()));
    }

    let (environment, folder, file) = match resolve(&ctx.registry, &key) {
        PathInfo::Monitored {
            environment,
            folder,
            file,
            ..
        } => (environment, folder, file),
        PathInfo::Unmonitored(reason) => {
            tracing::info!(%key, %reason, "Ignoring unmonitored key");
            return FileReport::skipped(None, key, Skipped::NotMonitored(reason));
        },
    };
    let Some(path) = ctx.registry.folder(&folder).and_then(|f| f.local_file(environment, &file)) else {
        let reason = Unmonitored::UnknownEnvironment {
            folder,
            environment: environment.to_string(),
        };
        return FileReport::skipped(Some(environment), key, Skipped::NotMonitored(reason));
    };

    let record = SyncRecord::new(environment, folder, file, Backend::ObjectStore, target.destination(), path);
    match apply(ctx, &key, record, target).await {
        Ok(report) => report,
        Err(e) => FileReport::failed(environment, key, e.failure(), e.to_string()),
    }
}

async fn apply(ctx: &Context, key: &str, record: SyncRecord, target: Target) -> ExecuteResult<FileReport> {
    let (source, destination) = match target {
        Target::Vcs => {
            let vcs = ctx.vcs.as_deref().ok_or_raise(|| ExecuteErrorKind::NoVcs)?;
            let source = state::read_storage(ctx.store.as_ref(), Backend::ObjectStore, key, Algorithm::GitBlob).await?;
            let destination = state::read_vcs(vcs, &record.destination_path, ctx.branch(record.environment)).await?;
            (source, destination)
        },
        Target::Local => {
            let source = state::read_storage(ctx.store.as_ref(), Backend::ObjectStore, key, Algorithm::Sha256).await?;
            let destination =
                state::read_storage(ctx.local.as_ref(), Backend::Local, &record.destination_path, Algorithm::Sha256)
                    .await?;
            (source, destination)
        },
    };
    let policy = ctx.policy(target.destination(), true);
    Ok(Executor::new(ctx).sync(record, source, destination, &policy).await)
}
