use crate::error::{ErrorKind, Result};
use crate::registry::MONITORED_SUFFIX;
use crate::{Environment, Registry};
use std::collections::{BTreeSet, HashSet};

impl Registry {
    /// Check every registry invariant, collecting all violations.
    ///
    /// Returns [`ConfigInvalid`](ErrorKind::ConfigInvalid) listing each
    /// problem found; a sync run must not start against an invalid registry.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if !problems.is_empty() {
            exn::bail!(ErrorKind::ConfigInvalid(problems));
        }
        Ok(())
    }

    /// All invariant violations, in a stable order.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut names = HashSet::new();
        let mut duplicate_names = BTreeSet::new();
        let mut prefixes = HashSet::new();
        let mut duplicate_prefixes = BTreeSet::new();
        let mut identities = HashSet::new();
        let mut duplicate_files = BTreeSet::new();

        for folder in &self.folders {
            if folder.name.trim().is_empty() {
                problems.push("folder with an empty name".to_string());
            }
            if !names.insert(folder.name.as_str()) {
                duplicate_names.insert(folder.name.clone());
            }

            for env in Environment::ALL {
                let prefix = folder.s3_prefix(env);
                let local = folder.local_path(env);
                match (&prefix, &local) {
                    (Some(_), None) => {
                        problems.push(format!(
                            "folder {} has an object-store prefix for {env} but no local path",
                            folder.name
                        ));
                    },
                    (None, Some(_)) => {
                        problems.push(format!(
                            "folder {} has a local path for {env} but no object-store prefix",
                            folder.name
                        ));
                    },
                    _ => {},
                }
                if let Some(prefix) = prefix {
                    let expected_env = prefix.split('/').nth(1);
                    if prefix.split('/').count() != 2 || expected_env != Some(env.as_str()) {
                        problems.push(format!(
                            "folder {} prefix {prefix} for {env} must have the form <base>/{env}",
                            folder.name
                        ));
                    }
                    if !prefixes.insert(prefix.to_string()) {
                        duplicate_prefixes.insert(prefix.into_owned());
                    }
                }
            }

            for file in &folder.files {
                if !file.name.ends_with(MONITORED_SUFFIX) || file.name.contains('/') {
                    problems.push(format!(
                        "folder {} tracks {} which is not a plain {MONITORED_SUFFIX} file name",
                        folder.name, file.name
                    ));
                }
                let identity = format!("{}/{}", folder.name, file.name);
                if !identities.insert(identity.clone()) {
                    duplicate_files.insert(identity);
                }
            }
        }

        if !duplicate_names.is_empty() {
            problems.push(format!("duplicate folder names: {}", join(&duplicate_names)));
        }
        if !duplicate_prefixes.is_empty() {
            problems.push(format!("duplicate object-store prefixes: {}", join(&duplicate_prefixes)));
        }
        if !duplicate_files.is_empty() {
            problems.push(format!("duplicate tracked files: {}", join(&duplicate_files)));
        }
        problems
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    fn registry(json: &str) -> Registry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_registry() {
        let registry = registry(
            r#"{"folders": [
                {"name": "config", "local_path": "app-config/config", "s3_prefix": "config",
                 "files": [{"name": "test.json"}]},
                {"name": "db", "local_path_staging": "db/staging", "s3_prefix_staging": "db-config/staging",
                 "files": [{"name": "pool.json"}]}
            ]}"#,
        );
        registry.validate().unwrap();
    }

    #[rstest]
    #[case::duplicate_names(
        r#"{"folders": [{"name": "a", "local_path": "a", "s3_prefix": "a"},
                        {"name": "a", "local_path": "b", "s3_prefix": "b"}]}"#,
        "duplicate folder names: a"
    )]
    #[case::duplicate_prefixes(
        r#"{"folders": [{"name": "a", "local_path": "a", "s3_prefix": "cfg"},
                        {"name": "b", "local_path_staging": "b", "s3_prefix_staging": "cfg/staging"}]}"#,
        "duplicate object-store prefixes: cfg/staging"
    )]
    #[case::duplicate_files(
        r#"{"folders": [{"name": "a", "local_path": "a", "s3_prefix": "a",
                         "files": [{"name": "x.json"}, {"name": "x.json"}]}]}"#,
        "duplicate tracked files: a/x.json"
    )]
    #[case::missing_local_path(
        r#"{"folders": [{"name": "a", "s3_prefix_staging": "a/staging"}]}"#,
        "folder a has an object-store prefix for staging but no local path"
    )]
    #[case::missing_prefix(
        r#"{"folders": [{"name": "a", "local_path_production": "a/production"}]}"#,
        "folder a has a local path for production but no object-store prefix"
    )]
    #[case::wrong_prefix_shape(
        r#"{"folders": [{"name": "a", "local_path_staging": "a", "s3_prefix_staging": "a/stage"}]}"#,
        "folder a prefix a/stage for staging must have the form <base>/staging"
    )]
    #[case::non_json_file(
        r#"{"folders": [{"name": "a", "local_path": "a", "s3_prefix": "a", "files": [{"name": "notes.txt"}]}]}"#,
        "folder a tracks notes.txt which is not a plain .json file name"
    )]
    fn test_reports_problem(#[case] json: &str, #[case] expected: &str) {
        let registry = registry(json);
        assert!(registry.problems().iter().any(|p| p == expected), "{:?}", registry.problems());
        let err = registry.validate().unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::ConfigInvalid(problems) if problems.iter().any(|p| p == expected)));
    }
}
