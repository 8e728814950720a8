//! `folders`: registry maintenance.
//!
//! Everything here works on the registry file and the local tree only; the
//! object store and the repository are never contacted.

use crate::backends;
use crate::cli::FolderCommand;
use crate::error::{ErrorKind, Result};
use confsync_config::{Environment, Folder, MONITORED_SUFFIX, Registry, SyncConfig};
use confsync_storage::StorageBackend;
use exn::ResultExt;
use std::path::Path;

pub async fn run(config: &SyncConfig, mut registry: Registry, command: FolderCommand, dry_run: bool) -> Result<()> {
    match command {
        FolderCommand::Report => {
            let local = backends::local(config, dry_run)?;
            report(&registry, local.as_ref()).await?;
            validate(&registry)
        },
        FolderCommand::CreateStructure => create_structure(&registry, backends::local(config, dry_run)?.as_ref()).await,
        FolderCommand::Migrate { from } => migrate(&registry, &from, backends::local(config, dry_run)?.as_ref()).await,
        FolderCommand::AddFolder {
            name,
            description,
            s3_prefix,
            local_base,
        } => {
            registry
                .add_folder(&name, &description, &s3_prefix, &local_base)
                .or_raise(|| ErrorKind::Registry)?;
            save(&registry, &config.registry, dry_run)?;
            println!("Added folder {name}");
            Ok(())
        },
        FolderCommand::AddFile {
            folder,
            file,
            description,
        } => {
            registry.add_file(&folder, &file, &description).or_raise(|| ErrorKind::Registry)?;
            save(&registry, &config.registry, dry_run)?;
            println!("Added {file} to folder {folder}");
            Ok(())
        },
        FolderCommand::Validate => validate(&registry),
        FolderCommand::List => {
            list(&registry);
            Ok(())
        },
        FolderCommand::ListFiles { folder } => {
            let Some(entry) = registry.folder(&folder) else {
                let err = exn::Exn::from(confsync_config::error::ErrorKind::FolderNotFound(folder));
                return Err(err).or_raise(|| ErrorKind::Registry);
            };
            list_files(entry, backends::local(config, dry_run)?.as_ref()).await
        },
    }
}

fn save(registry: &Registry, path: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        tracing::info!(path = %path.display(), "Dry run: registry not saved");
        return Ok(());
    }
    registry.save(path).or_raise(|| ErrorKind::Registry)
}

fn validate(registry: &Registry) -> Result<()> {
    let problems = registry.problems();
    if problems.is_empty() {
        println!("Registry is valid: {} folders, {} files", registry.folders.len(), registry.file_count());
        return Ok(());
    }
    for problem in &problems {
        println!("  - {problem}");
    }
    exn::bail!(ErrorKind::RegistryInvalid(problems.len()))
}

fn list(registry: &Registry) {
    for folder in &registry.folders {
        println!("{} ({} files)", folder.name, folder.files.len());
        if !folder.description.is_empty() {
            println!("  {}", folder.description);
        }
        for env in Environment::ALL {
            let local = folder.local_path(env).unwrap_or_default();
            let prefix = folder.s3_prefix(env).unwrap_or_default();
            println!("  {env:<10} local={local} s3={prefix}");
        }
    }
}

async fn report(registry: &Registry, local: &dyn StorageBackend) -> Result<()> {
    println!("{} folders, {} tracked files", registry.folders.len(), registry.file_count());
    for folder in &registry.folders {
        println!();
        println!("{} ({})", folder.name, folder.description);
        for env in Environment::ALL {
            println!(
                "  {env:<10} local={} s3={}",
                folder.local_path(env).unwrap_or_default(),
                folder.s3_prefix(env).unwrap_or_default()
            );
        }
        list_files(folder, local).await?;
    }
    println!();
    println!("Object-store event filters:");
    for line in event_filters(registry) {
        println!("{line}");
    }
    Ok(())
}

/// One line per prefix that should raise object-store notifications.
fn event_filters(registry: &Registry) -> Vec<String> {
    registry
        .monitored_prefixes()
        .into_iter()
        .map(|p| format!("  {}*{MONITORED_SUFFIX} ({} {})", p.prefix, p.folder, p.environment))
        .collect()
}

async fn list_files(folder: &Folder, local: &dyn StorageBackend) -> Result<()> {
    if folder.files.is_empty() {
        println!("  (no files)");
    }
    for file in &folder.files {
        let mut marks = Vec::new();
        for env in Environment::ALL {
            let present = match folder.local_file(env, &file.name) {
                Some(path) => local.exists(Path::new(&path)).await.or_raise(|| ErrorKind::Local(path.clone()))?,
                None => false,
            };
            marks.push(format!("{env}:{}", if present { "yes" } else { "no" }));
        }
        println!("  {} [{}] {}", file.name, marks.join(" "), file.description);
    }
    Ok(())
}

async fn create_structure(registry: &Registry, local: &dyn StorageBackend) -> Result<()> {
    for folder in &registry.folders {
        for env in Environment::ALL {
            let Some(dir) = folder.local_path(env) else {
                continue;
            };
            let path = Path::new(dir.as_ref());
            if local.exists(path).await.or_raise(|| ErrorKind::Local(dir.to_string()))? {
                println!("  exists  {dir}");
                continue;
            }
            local.create_dir(path).await.or_raise(|| ErrorKind::Local(dir.to_string()))?;
            println!("  created {dir}");
        }
    }
    Ok(())
}

/// Move `{from}/{file}` to the folder's staging directory for every tracked
/// file found directly under `from` (relative to the local root).
async fn migrate(registry: &Registry, from: &Path, local: &dyn StorageBackend) -> Result<()> {
    let mut moved = 0usize;
    for folder in &registry.folders {
        for file in &folder.files {
            let Some(target) = folder.local_file(Environment::Staging, &file.name) else {
                continue;
            };
            let source = from.join(&file.name);
            let display = source.display().to_string();
            if !local.exists(&source).await.or_raise(|| ErrorKind::Local(display.clone()))? {
                println!("  missing {display}");
                continue;
            }
            local
                .rename(&source, Path::new(&target))
                .await
                .or_raise(|| ErrorKind::Local(display.clone()))?;
            tracing::info!(folder = %folder.name, file = %file.name, to = %target, "Migrated file");
            println!("  moved   {display} -> {target}");
            moved += 1;
        }
    }
    println!("{moved} files migrated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_storage::BackendHandle;
    use confsync_storage::backend::{LocalBackend, ReadOnlyBackend};
    use std::sync::Arc;

    fn registry() -> Registry {
        serde_json::from_str(
            r#"{"folders": [{
                "name": "config",
                "description": "Primary configuration",
                "local_path": "app/config",
                "s3_prefix": "config",
                "files": [{"name": "a.json"}, {"name": "b.json"}]
            }]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_structure() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalBackend::new("local", dir.path()).unwrap();
        create_structure(&registry(), &local).await.unwrap();
        assert!(dir.path().join("app/config/staging").is_dir());
        assert!(dir.path().join("app/config/production").is_dir());
        // A second run finds everything in place.
        create_structure(&registry(), &local).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_moves_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("flat")).unwrap();
        std::fs::write(dir.path().join("flat/a.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("flat/untracked.json"), b"{}").unwrap();
        let local = LocalBackend::new("local", dir.path()).unwrap();

        migrate(&registry(), Path::new("flat"), &local).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("app/config/staging/a.json")).unwrap(), b"{}");
        assert!(!dir.path().join("flat/a.json").exists());
        assert!(dir.path().join("flat/untracked.json").exists());
        assert!(!dir.path().join("app/config/staging/b.json").exists());
    }

    #[tokio::test]
    async fn test_migrate_dry_run_moves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("flat")).unwrap();
        std::fs::write(dir.path().join("flat/a.json"), b"{}").unwrap();
        let inner: BackendHandle = Arc::new(LocalBackend::new("local", dir.path()).unwrap());
        let local = ReadOnlyBackend::new(inner);

        migrate(&registry(), Path::new("flat"), &local).await.unwrap();

        assert!(dir.path().join("flat/a.json").exists());
        assert!(!dir.path().join("app/config/staging/a.json").exists());
    }

    #[test]
    fn test_event_filters_cover_every_environment() {
        assert_eq!(
            event_filters(&registry()),
            [
                "  config/staging/*.json (config staging)",
                "  config/production/*.json (config production)",
            ]
        );
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut registry = registry();
        registry.folders.push(registry.folders[0].clone());
        let err = validate(&registry).unwrap_err();
        assert!(matches!(&*err, ErrorKind::RegistryInvalid(n) if *n > 0));
        assert!(validate(&self::registry()).is_ok());
    }
}
