//! Object key to tracked file resolution.

use confsync_config::{Environment, MONITORED_SUFFIX, Registry};
use derive_more::Display;

/// Why a key is not a monitored configuration file.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Unmonitored {
    #[display("key has fewer than three segments")]
    TooShort,
    #[display("key does not end in .json")]
    NotJson,
    #[display("no folder uses prefix base {_0}")]
    UnknownFolder(String),
    #[display("folder {folder} has no prefix for environment {environment}")]
    UnknownEnvironment { folder: String, environment: String },
    #[display("{file} is not tracked in folder {folder}")]
    UntrackedFile { folder: String, file: String },
    #[display("{expected} is not the configured prefix of folder {folder}")]
    PrefixMismatch { folder: String, expected: String },
}

/// Resolution of one object key against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathInfo {
    Monitored {
        environment: Environment,
        /// Configured prefix, including its trailing slash.
        prefix: String,
        folder: String,
        file: String,
    },
    Unmonitored(Unmonitored),
}

impl PathInfo {
    pub fn is_monitored(&self) -> bool {
        matches!(self, Self::Monitored { .. })
    }
}

/// Normalize a key as delivered in an object-store event: `+` means a space,
/// everything else is percent-encoded.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Decide whether `key` is a tracked file, and which one.
///
/// Keys have the shape `{base}/{environment}/{file}`. The folder is picked by
/// `base` alone (first match wins), then everything else must agree with that
/// folder's configuration, including the full prefix.
pub fn resolve(registry: &Registry, key: &str) -> PathInfo {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() < 3 {
        return PathInfo::Unmonitored(Unmonitored::TooShort);
    }
    let file = segments[segments.len() - 1];
    if !file.ends_with(MONITORED_SUFFIX) {
        return PathInfo::Unmonitored(Unmonitored::NotJson);
    }
    let (base, environment) = (segments[0], segments[1]);

    let Some(folder) = registry.folders.iter().find(|folder| {
        Environment::ALL.iter().any(|env| folder.prefix_base(*env).as_deref() == Some(base))
    }) else {
        return PathInfo::Unmonitored(Unmonitored::UnknownFolder(base.to_string()));
    };

    let Some((environment, configured)) = environment
        .parse::<Environment>()
        .ok()
        .and_then(|env| folder.s3_prefix(env).map(|prefix| (env, prefix)))
    else {
        return PathInfo::Unmonitored(Unmonitored::UnknownEnvironment {
            folder: folder.name.clone(),
            environment: environment.to_string(),
        });
    };

    let file = segments[2];
    if !folder.tracks(file) {
        return PathInfo::Unmonitored(Unmonitored::UntrackedFile {
            folder: folder.name.clone(),
            file: file.to_string(),
        });
    }

    let expected = format!("{base}/{environment}");
    if configured != expected.as_str() || segments.len() != 3 {
        return PathInfo::Unmonitored(Unmonitored::PrefixMismatch {
            folder: folder.name.clone(),
            expected,
        });
    }

    PathInfo::Monitored {
        environment,
        prefix: format!("{configured}/"),
        folder: folder.name.clone(),
        file: file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_config::{Folder, TrackedFile};
    use rstest::rstest;

    fn registry() -> Registry {
        Registry {
            folders: vec![
                Folder {
                    name: "config".to_string(),
                    description: String::new(),
                    local_path: None,
                    local_path_staging: Some("config/staging".to_string()),
                    local_path_production: Some("config/production".to_string()),
                    s3_prefix: None,
                    s3_prefix_staging: Some("config/staging".to_string()),
                    s3_prefix_production: Some("config/production".to_string()),
                    files: vec![TrackedFile {
                        name: "test.json".to_string(),
                        description: String::new(),
                    }],
                },
                Folder {
                    name: "flags".to_string(),
                    description: String::new(),
                    local_path: None,
                    local_path_staging: Some("flags/staging".to_string()),
                    local_path_production: None,
                    s3_prefix: None,
                    s3_prefix_staging: Some("flags/stage".to_string()),
                    s3_prefix_production: None,
                    files: vec![TrackedFile {
                        name: "flags.json".to_string(),
                        description: String::new(),
                    }],
                },
            ],
            ..Registry::default()
        }
    }

    #[test]
    fn test_resolves_tracked_file() {
        let info = resolve(&registry(), "config/staging/test.json");
        assert_eq!(
            info,
            PathInfo::Monitored {
                environment: Environment::Staging,
                prefix: "config/staging/".to_string(),
                folder: "config".to_string(),
                file: "test.json".to_string(),
            }
        );
        assert!(info.is_monitored());
    }

    #[rstest]
    #[case("config/production/unknown.json")]
    #[case("other/staging/test.json")]
    #[case("config/staging/test.txt")]
    #[case("config/test.json")]
    #[case("config/qa/test.json")]
    #[case("config/staging/nested/test.json")]
    #[case("flags/production/flags.json")]
    #[case("flags/staging/flags.json")]
    fn test_rejects(#[case] key: &str) {
        assert!(!resolve(&registry(), key).is_monitored(), "{key} should not be monitored");
    }

    #[rstest]
    #[case("config/production/unknown.json", Unmonitored::UntrackedFile { folder: "config".into(), file: "unknown.json".into() })]
    #[case("other/staging/test.json", Unmonitored::UnknownFolder("other".into()))]
    #[case("config/staging/test.txt", Unmonitored::NotJson)]
    #[case("config/test.json", Unmonitored::TooShort)]
    #[case("flags/staging/flags.json", Unmonitored::PrefixMismatch { folder: "flags".into(), expected: "flags/staging".into() })]
    fn test_rejection_reason(#[case] key: &str, #[case] reason: Unmonitored) {
        assert_eq!(resolve(&registry(), key), PathInfo::Unmonitored(reason));
    }

    #[rstest]
    #[case("config/staging/test.json", "config/staging/test.json")]
    #[case("config/staging/my+file.json", "config/staging/my file.json")]
    #[case("config/staging/my%20file.json", "config/staging/my file.json")]
    #[case("config/staging/a%2Bb.json", "config/staging/a+b.json")]
    #[case("config/staging/%E2%9C%93.json", "config/staging/\u{2713}.json")]
    fn test_decode_key(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_key(raw), expected);
    }
}
