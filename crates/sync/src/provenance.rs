//! Provenance tags: where an object's current content came from.
//!
//! Every object the sync writes carries these tags as object metadata. They are
//! the loop breaker: a change that came from system X is never synced back to
//! X. Reading is best-effort. Untagged objects are treated as manual edits and
//! stay eligible for sync; a malformed field is treated as unknown, never as an
//! error.

use confsync_config::Environment;
use confsync_storage::Metadata;
use derive_more::Display;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub const SYNCED_FROM: &str = "synced-from";
pub const SYNC_DIRECTION: &str = "sync-direction";
pub const SYNCED_AT: &str = "synced-at";
pub const FILE_HASH: &str = "file-hash";
pub const ENVIRONMENT: &str = "environment";
pub const SOURCE_FOLDER: &str = "source-folder";
pub const SOURCE_FILE: &str = "source-file";
pub const COMMIT_SHA: &str = "commit-sha";
pub const COPIED_FROM: &str = "copied-from";

const KEYS: [&str; 9] = [
    SYNCED_FROM,
    SYNC_DIRECTION,
    SYNCED_AT,
    FILE_HASH,
    ENVIRONMENT,
    SOURCE_FOLDER,
    SOURCE_FILE,
    COMMIT_SHA,
    COPIED_FROM,
];

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Direction {
    #[display("github-to-s3")]
    GithubToS3,
    #[display("s3-to-github")]
    S3ToGithub,
    /// Written by something else; kept verbatim and never matched.
    #[display("{_0}")]
    Other(String),
}

impl Direction {
    fn parse(value: &str) -> Self {
        match value {
            "github-to-s3" => Self::GithubToS3,
            "s3-to-github" => Self::S3ToGithub,
            other => Self::Other(other.to_string()),
        }
    }

    /// System identifier the change originated from.
    pub fn origin(&self) -> Option<&'static str> {
        match self {
            Self::GithubToS3 => Some("github"),
            Self::S3ToGithub => Some("s3"),
            Self::Other(_) => None,
        }
    }
}

/// Provenance read back from an object's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub synced_from: Option<String>,
    pub direction: Option<Direction>,
    /// `None` when missing or not a valid RFC 3339 timestamp.
    pub synced_at: Option<OffsetDateTime>,
    pub file_hash: Option<String>,
    pub environment: Option<String>,
    pub source_folder: Option<String>,
    pub source_file: Option<String>,
    pub commit_sha: Option<String>,
    pub copied_from: Option<String>,
}

impl Provenance {
    /// Read provenance from object metadata, or `None` if the object carries
    /// no provenance keys at all.
    pub fn read(metadata: &Metadata) -> Option<Self> {
        if !KEYS.iter().any(|key| metadata.contains_key(*key)) {
            return None;
        }
        let text = |key: &str| metadata.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string);
        let synced_at = metadata.get(SYNCED_AT).and_then(|raw| match OffsetDateTime::parse(raw.trim(), &Rfc3339) {
            Ok(at) => Some(at),
            Err(e) => {
                tracing::debug!(value = %raw, error = %e, "Ignoring malformed sync timestamp");
                None
            },
        });
        Some(Self {
            synced_from: text(SYNCED_FROM),
            direction: text(SYNC_DIRECTION).map(|d| Direction::parse(&d)),
            synced_at,
            file_hash: text(FILE_HASH),
            environment: text(ENVIRONMENT),
            source_folder: text(SOURCE_FOLDER),
            source_file: text(SOURCE_FILE),
            commit_sha: text(COMMIT_SHA),
            copied_from: text(COPIED_FROM),
        })
    }

    /// Whether the tags say this content came from `system` (`github` or `s3`).
    pub fn originates_from(&self, system: &str) -> bool {
        self.direction.as_ref().and_then(Direction::origin) == Some(system)
            || self.synced_from.as_deref().is_some_and(|from| from.contains(system))
    }

    /// Whether the last sync happened less than `window` away from `now`.
    pub fn synced_within(&self, window: Duration, now: OffsetDateTime) -> bool {
        self.synced_at.is_some_and(|at| (now - at).abs() < window)
    }
}

/// What to record about a write to the object store.
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    pub synced_from: &'a str,
    pub direction: Direction,
    /// SHA-256 of the content being written.
    pub file_hash: &'a str,
    pub environment: Environment,
    pub folder: &'a str,
    pub file: &'a str,
    pub commit_sha: Option<&'a str>,
    pub copied_from: Option<Environment>,
}

/// Build the metadata attached to an object-store write made at `now`.
pub fn tag(tag: &Tag<'_>, now: OffsetDateTime) -> Metadata {
    let mut metadata = Metadata::new();
    let synced_at = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());
    metadata.insert(SYNCED_FROM.to_string(), tag.synced_from.to_string());
    metadata.insert(SYNC_DIRECTION.to_string(), tag.direction.to_string());
    metadata.insert(SYNCED_AT.to_string(), synced_at);
    metadata.insert(FILE_HASH.to_string(), tag.file_hash.to_string());
    metadata.insert(ENVIRONMENT.to_string(), tag.environment.to_string());
    metadata.insert(SOURCE_FOLDER.to_string(), tag.folder.to_string());
    metadata.insert(SOURCE_FILE.to_string(), tag.file.to_string());
    if let Some(sha) = tag.commit_sha {
        metadata.insert(COMMIT_SHA.to_string(), sha.to_string());
    }
    if let Some(from) = tag.copied_from {
        metadata.insert(COPIED_FROM.to_string(), from.to_string());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_tag_then_read() {
        let now = datetime!(2024-03-01 12:00:00 UTC);
        let written = tag(
            &Tag {
                synced_from: "github-staging",
                direction: Direction::GithubToS3,
                file_hash: "abc123",
                environment: Environment::Staging,
                folder: "config",
                file: "test.json",
                commit_sha: Some("deadbeef"),
                copied_from: None,
            },
            now,
        );
        assert_eq!(written.get(SYNCED_AT).unwrap(), "2024-03-01T12:00:00Z");
        assert!(!written.contains_key(COPIED_FROM));

        let provenance = Provenance::read(&written).unwrap();
        assert_eq!(provenance.direction, Some(Direction::GithubToS3));
        assert_eq!(provenance.synced_at, Some(now));
        assert_eq!(provenance.file_hash.as_deref(), Some("abc123"));
        assert_eq!(provenance.source_file.as_deref(), Some("test.json"));
        assert_eq!(provenance.commit_sha.as_deref(), Some("deadbeef"));
        assert!(provenance.originates_from("github"));
        assert!(!provenance.originates_from("s3"));
    }

    #[test]
    fn test_untagged_objects_have_no_provenance() {
        assert_eq!(Provenance::read(&Metadata::new()), None);
        assert_eq!(Provenance::read(&metadata(&[("content-owner", "ops")])), None);
    }

    #[test]
    fn test_malformed_fields_degrade_to_unknown() {
        let provenance =
            Provenance::read(&metadata(&[(SYNCED_AT, "yesterday"), (SYNC_DIRECTION, "sideways")])).unwrap();
        assert_eq!(provenance.synced_at, None);
        assert_eq!(provenance.direction, Some(Direction::Other("sideways".to_string())));
        assert!(!provenance.originates_from("github"));
        assert!(!provenance.synced_within(Duration::minutes(5), OffsetDateTime::now_utc()));
    }

    #[rstest]
    #[case(&[(SYNCED_FROM, "github-production")], "github", true)]
    #[case(&[(SYNCED_FROM, "github-staging-staging-copy")], "github", true)]
    #[case(&[(SYNCED_FROM, "manual-upload")], "github", false)]
    #[case(&[(SYNC_DIRECTION, "s3-to-github")], "s3", true)]
    #[case(&[(SYNC_DIRECTION, "s3-to-github")], "github", false)]
    fn test_originates_from(#[case] pairs: &[(&str, &str)], #[case] system: &str, #[case] expected: bool) {
        let provenance = Provenance::read(&metadata(pairs)).unwrap();
        assert_eq!(provenance.originates_from(system), expected);
    }

    #[rstest]
    #[case(Duration::ZERO, true)]
    #[case(Duration::minutes(4), true)]
    #[case(Duration::minutes(-4), true)]
    #[case(Duration::minutes(5), false)]
    #[case(Duration::minutes(10), false)]
    fn test_synced_within(#[case] age: Duration, #[case] expected: bool) {
        let now = datetime!(2024-03-01 12:00:00 UTC);
        let provenance = Provenance {
            synced_at: Some(now - age),
            ..Provenance::default()
        };
        assert_eq!(provenance.synced_within(Duration::minutes(5), now), expected);
    }
}
