//! End-to-end behaviour of the sync protocol against in-memory backends.

use confsync_config::{Environment, Folder, Registry, SyncConfig, TrackedFile};
use confsync_storage::backend::{MockBackend, StorageBackend};
use confsync_storage::error::Failure;
use confsync_storage::{BackendHandle, Metadata};
use confsync_sync::decide::{Presence, Reason, Status};
use confsync_sync::execute::Outcome;
use confsync_sync::provenance::{self, Provenance};
use confsync_sync::resolve::Unmonitored;
use confsync_sync::{
    Backend, Context, FileStatus, S3Event, Skipped, Summary, SyncOptions, Target, handle, mirror, monitor, parse_event,
    pull, push,
};
use confsync_vcs::VcsHandle;
use confsync_vcs::backend::MockVcs;
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const BUCKET: &str = "configs";
const A: &str = "config/staging/a.json";
const B: &str = "config/staging/b.json";

fn registry() -> Registry {
    Registry {
        folders: vec![Folder {
            name: "config".to_string(),
            description: "Service configuration".to_string(),
            local_path: Some("config".to_string()),
            local_path_staging: None,
            local_path_production: None,
            s3_prefix: Some("config".to_string()),
            s3_prefix_staging: None,
            s3_prefix_production: None,
            files: ["a.json", "b.json"]
                .into_iter()
                .map(|name| TrackedFile {
                    name: name.to_string(),
                    description: String::new(),
                })
                .collect(),
        }],
        ..Registry::default()
    }
}

struct World {
    ctx: Context,
    local: Arc<MockBackend>,
    store: Arc<MockBackend>,
    vcs: Arc<MockVcs>,
}

fn world(local: MockBackend, store: MockBackend, vcs: MockVcs) -> World {
    let (local, store, vcs) = (Arc::new(local), Arc::new(store), Arc::new(vcs));
    let mut config = SyncConfig::default();
    config.store.bucket = BUCKET.to_string();
    let local_handle: BackendHandle = local.clone();
    let store_handle: BackendHandle = store.clone();
    let vcs_handle: VcsHandle = vcs.clone();
    let ctx = Context::new(config, registry(), local_handle, store_handle, Some(vcs_handle)).unwrap();
    World { ctx, local, store, vcs }
}

fn files(files: &[(&str, &str)]) -> MockBackend {
    MockBackend::with_files(files.iter().map(|(path, content)| (*path, content.as_bytes().to_vec())))
}

/// A repository with both environment branches; `staging` also holds `files`.
fn repository(files: &[(&str, &str)]) -> MockVcs {
    let staging = std::iter::once(("README.md", "staging")).chain(files.iter().copied());
    MockVcs::new()
        .with_branch("staging", staging)
        .with_branch("main", [("README.md", "production")])
}

fn event(bucket: &str, key: &str, name: &str) -> S3Event {
    let payload = format!(
        r#"{{"Records": [{{"eventName": "{name}", "s3": {{"bucket": {{"name": "{bucket}"}}, "object": {{"key": "{key}"}}}}}}]}}"#
    );
    parse_event(payload.as_bytes()).unwrap()
}

fn status<'a>(summary: &'a Summary, path: &str) -> &'a FileStatus {
    &summary.files.iter().find(|report| report.path == path).unwrap().status
}

fn skipped(reason: Reason) -> FileStatus {
    FileStatus::Skipped(Skipped::Decision(reason))
}

#[tokio::test]
async fn test_push_is_idempotent() {
    let w = world(files(&[(A, r#"{"a":1}"#)]), MockBackend::default(), repository(&[]));

    let summary = Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Created));
    assert_eq!(status(&summary, B), &skipped(Reason::NothingToSync));
    assert_eq!(w.store.writes(), 1);

    let summary = Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::Unchanged));
    assert_eq!(w.store.writes(), 1);
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn test_pushed_object_is_not_synced_back() {
    let w = world(files(&[(A, r#"{"a":1}"#)]), MockBackend::default(), repository(&[]));
    Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();

    let object = w.store.get(Path::new(A)).await.unwrap();
    let provenance = Provenance::read(&object.info.metadata).unwrap();
    assert!(provenance.originates_from("github"));

    let event = event(BUCKET, A, "ObjectCreated:Put");
    for target in [Target::Vcs, Target::Local] {
        let summary = Summary::collect(handle(&w.ctx, &event, target)).await.unwrap();
        assert_eq!(status(&summary, A), &skipped(Reason::OriginatesFromDestination), "{target}");
    }
    assert_eq!(w.vcs.commit_messages("staging").await.len(), 1);
    assert_eq!(w.local.writes(), 0);

    // Pulling the same object is just as circular.
    let summary = Summary::collect(pull(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::OriginatesFromDestination));
    assert_eq!(w.vcs.commit_messages("staging").await.len(), 1);
}

#[tokio::test]
async fn test_recent_sync_is_suppressed() {
    let now = OffsetDateTime::now_utc().format(&Rfc3339).unwrap();
    let metadata = Metadata::from([
        (provenance::SYNCED_AT.to_string(), now),
        (provenance::SYNCED_FROM.to_string(), "manual-upload".to_string()),
    ]);
    let store = MockBackend::with_objects([(A, b"{}".to_vec(), metadata)]);
    let w = world(MockBackend::default(), store, repository(&[]));

    let event = event(BUCKET, A, "ObjectCreated:Put");
    let summary = Summary::collect(handle(&w.ctx, &event, Target::Vcs)).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::RecentlySynced));
    assert!(w.vcs.file("staging", A).await.is_none());
}

#[tokio::test]
async fn test_manual_upload_reaches_vcs_once() {
    let w = world(MockBackend::default(), files(&[(A, r#"{"manual":true}"#)]), repository(&[]));
    let event = event(BUCKET, A, "ObjectCreated:Put");

    let summary = Summary::collect(handle(&w.ctx, &event, Target::Vcs)).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Created));
    assert_eq!(w.vcs.file("staging", A).await.unwrap(), br#"{"manual":true}"#);
    let commits = w.vcs.commit_messages("staging").await.len();

    // Replaying the event finds identical blobs.
    let summary = Summary::collect(handle(&w.ctx, &event, Target::Vcs)).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::Unchanged));
    assert_eq!(w.vcs.commit_messages("staging").await.len(), commits);
}

#[tokio::test]
async fn test_manual_upload_reaches_local_tree() {
    let w = world(files(&[(A, "old")]), files(&[(A, "new")]), repository(&[]));
    let summary = Summary::collect(handle(&w.ctx, &event(BUCKET, A, "ObjectCreated:Put"), Target::Local))
        .await
        .unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Updated));
    assert_eq!(w.local.read(Path::new(A)).await.unwrap(), b"new");
}

#[tokio::test]
async fn test_removal_propagates_and_repeats_cleanly() {
    let vcs = repository(&[(A, "{}")]);
    let w = world(MockBackend::default(), MockBackend::default(), vcs);
    let event = event(BUCKET, A, "ObjectRemoved:Delete");

    let summary = Summary::collect(handle(&w.ctx, &event, Target::Vcs)).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Deleted));
    assert!(w.vcs.file("staging", A).await.is_none());

    let summary = Summary::collect(handle(&w.ctx, &event, Target::Vcs)).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::NothingToSync));
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn test_stale_removal_event_uses_current_state() {
    let vcs = repository(&[(A, "{}")]);
    let w = world(MockBackend::default(), files(&[(A, "{}")]), vcs);

    let summary = Summary::collect(handle(&w.ctx, &event(BUCKET, A, "ObjectRemoved:Delete"), Target::Vcs))
        .await
        .unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::Unchanged));
    assert!(w.vcs.file("staging", A).await.is_some());
}

#[tokio::test]
async fn test_unmonitored_keys_are_skipped() {
    let w = world(MockBackend::default(), MockBackend::default(), repository(&[]));
    let cases = [
        (BUCKET, "other/staging/a.json", Skipped::NotMonitored(Unmonitored::UnknownFolder("other".to_string()))),
        (
            BUCKET,
            "config/staging/untracked.json",
            Skipped::NotMonitored(Unmonitored::UntrackedFile {
                folder: "config".to_string(),
                file: "untracked.json".to_string(),
            }),
        ),
        (BUCKET, "config/readme.json", Skipped::NotMonitored(Unmonitored::TooShort)),
        ("elsewhere", A, Skipped::OtherBucket("elsewhere".to_string())),
    ];
    for (bucket, key, expected) in cases {
        let summary = Summary::collect(handle(&w.ctx, &event(bucket, key, "ObjectCreated:Put"), Target::Vcs))
            .await
            .unwrap();
        assert_eq!(status(&summary, key), &FileStatus::Skipped(expected));
    }
    assert_eq!(w.vcs.commit_messages("staging").await.len(), 1);
}

#[tokio::test]
async fn test_vcs_target_requires_vcs() {
    let local: BackendHandle = Arc::new(MockBackend::default());
    let store: BackendHandle = Arc::new(MockBackend::default());
    let ctx = Context::new(SyncConfig::default(), registry(), local, store, None).unwrap();
    let event = event(BUCKET, A, "ObjectCreated:Put");
    assert!(Summary::collect(handle(&ctx, &event, Target::Vcs)).await.is_err());
    assert!(Summary::collect(pull(&ctx, Environment::Staging, SyncOptions::default())).await.is_err());
}

#[tokio::test]
async fn test_pull_commits_once() {
    let store = files(&[(A, "1"), (B, "2"), ("config/staging/extra.json", "3")]);
    let w = world(MockBackend::default(), store, repository(&[]));

    let summary = Summary::collect(pull(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Created));
    assert_eq!(status(&summary, B), &FileStatus::Applied(Outcome::Created));
    assert_eq!(status(&summary, "config/staging/extra.json"), &FileStatus::Skipped(Skipped::Untracked));
    assert_eq!(
        w.vcs.commit_messages("staging").await,
        ["Sync 2 files from S3 (staging)", "initial commit"]
    );
    assert_eq!(w.vcs.paths("staging").await, ["README.md", A, B]);
}

#[tokio::test]
async fn test_pull_on_stale_base_changes_nothing() {
    let w = world(MockBackend::default(), files(&[(A, "1"), (B, "2")]), repository(&[]));
    w.vcs.interleave_commit("staging", "config/staging/z.json", "concurrent").await;

    let summary = Summary::collect(pull(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(summary.failed(), 2);
    for report in summary.failures() {
        assert!(matches!(report.status, FileStatus::Failed { failure: Failure::Conflict, .. }));
    }
    assert!(w.vcs.file("staging", A).await.is_none());
    assert!(w.vcs.file("staging", B).await.is_none());
}

#[tokio::test]
async fn test_push_deletes_only_when_pruning() {
    let w = world(files(&[(A, "{}")]), MockBackend::default(), repository(&[]));
    Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    w.local.delete(Path::new(A)).await.unwrap();

    let summary = Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::DeletionDisabled));
    assert!(w.store.exists(Path::new(A)).await.unwrap());

    let prune = SyncOptions {
        prune: true,
        ..SyncOptions::default()
    };
    let summary = Summary::collect(push(&w.ctx, Environment::Staging, prune)).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Deleted));
    assert!(!w.store.exists(Path::new(A)).await.unwrap());
}

#[tokio::test]
async fn test_push_production_falls_back_to_staging() {
    let production = "config/production/a.json";
    let w = world(files(&[(A, r#"{"from":"staging"}"#)]), MockBackend::default(), repository(&[]));

    let summary = Summary::collect(push(&w.ctx, Environment::Production, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, production), &FileStatus::Applied(Outcome::Created));
    assert_eq!(w.local.read(Path::new(production)).await.unwrap(), br#"{"from":"staging"}"#);

    let object = w.store.get(Path::new(production)).await.unwrap();
    assert_eq!(object.data, br#"{"from":"staging"}"#);
    let provenance = Provenance::read(&object.info.metadata).unwrap();
    assert_eq!(provenance.copied_from.as_deref(), Some("staging"));
    assert_eq!(provenance.synced_from.as_deref(), Some("github-production-staging-copy"));
    assert_eq!(provenance.environment.as_deref(), Some("production"));
}

#[tokio::test]
async fn test_push_rejects_invalid_json() {
    let w = world(files(&[(A, "{not json")]), MockBackend::default(), repository(&[]));
    let summary = Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert!(matches!(status(&summary, A), FileStatus::Failed { failure: Failure::Fatal, .. }));
    assert!(summary.has_failures());
    assert_eq!(w.store.writes(), 0);
}

#[tokio::test]
async fn test_mirror_populates_a_fresh_tree_with_pushed_content() {
    let w = world(files(&[(A, "{}")]), MockBackend::default(), repository(&[]));
    Summary::collect(push(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    w.local.delete(Path::new(A)).await.unwrap();

    let summary = Summary::collect(mirror(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &FileStatus::Applied(Outcome::Created));
    assert_eq!(w.local.read(Path::new(A)).await.unwrap(), b"{}");

    // Unchanged content is left alone on the next run.
    let summary = Summary::collect(mirror(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, A), &skipped(Reason::Unchanged));
}

#[tokio::test]
async fn test_mirror_downloads_manual_uploads() {
    let w = world(MockBackend::default(), files(&[(B, "[2]")]), repository(&[]));
    let summary = Summary::collect(mirror(&w.ctx, Environment::Staging, SyncOptions::default())).await.unwrap();
    assert_eq!(status(&summary, B), &FileStatus::Applied(Outcome::Created));
    assert_eq!(w.local.read(Path::new(B)).await.unwrap(), b"[2]");
}

#[tokio::test]
async fn test_monitor_reconciles_three_ways() {
    let vcs = repository(&[(A, "vcs")]);
    let w = world(files(&[(A, "same")]), files(&[(A, "same")]), vcs);

    let states = monitor(&w.ctx, &[Environment::Staging]).await.unwrap();
    assert_eq!(states.len(), 2);
    let a = states.iter().find(|s| s.file == "a.json").unwrap();
    assert_eq!(
        a.status,
        Status::OutOfSync {
            stale: Backend::Vcs,
            authority: Backend::Local,
        }
    );
    assert!(matches!(a.vcs, Some(Presence::Present(_))));
    let b = states.iter().find(|s| s.file == "b.json").unwrap();
    assert_eq!(b.status, Status::InSync);
    assert_eq!(b.local, Presence::Absent);
}
