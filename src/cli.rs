//! Command-line definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use confsync_config::Environment;
use confsync_sync::{SyncOptions, Target};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "confsync", version, about = "Mirror JSON configuration between S3, GitHub and a local tree")]
pub struct Cli {
    /// Explicit settings file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "CONFSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read everything, write nothing.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload the local tree to the object store.
    Push(SyncArgs),
    /// Commit the object store's contents to the repository.
    Pull(SyncArgs),
    /// Download the object store's contents into the local tree.
    Mirror(SyncArgs),
    /// Report where every tracked file stands.
    Monitor {
        #[arg(long, value_enum, default_value_t = EnvArg::All)]
        env: EnvArg,
    },
    /// Process an object-store event notification read from FILE.
    HandleEvent {
        #[arg(long, value_enum)]
        target: TargetArg,
        /// Event JSON; `-` reads standard input.
        file: PathBuf,
    },
    /// Maintain the folder registry.
    Folders {
        #[command(subcommand)]
        command: FolderCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[arg(long, value_enum, default_value_t = EnvArg::All)]
    pub env: EnvArg,
    /// Only sync this folder.
    #[arg(long)]
    pub folder: Option<String>,
    /// Delete destination files whose source no longer exists.
    #[arg(long)]
    pub prune: bool,
}

impl SyncArgs {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            folder: self.folder.clone(),
            prune: self.prune,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    /// Show every folder, its paths and which files exist locally.
    Report,
    /// Create the local directory of every folder and environment.
    CreateStructure,
    /// Move tracked files found directly under DIR into their folder's
    /// staging directory.
    Migrate {
        /// Directory relative to the local root.
        #[arg(long)]
        from: PathBuf,
    },
    AddFolder {
        name: String,
        description: String,
        /// Object-store prefix; the environment is appended.
        s3_prefix: String,
        /// Local directory the folder is created under.
        #[arg(default_value = "config")]
        local_base: String,
    },
    AddFile {
        folder: String,
        file: String,
        #[arg(default_value = "")]
        description: String,
    },
    Validate,
    List,
    ListFiles {
        folder: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvArg {
    Staging,
    Production,
    All,
}

impl EnvArg {
    pub fn environments(self) -> Vec<Environment> {
        match self {
            Self::Staging => vec![Environment::Staging],
            Self::Production => vec![Environment::Production],
            Self::All => Environment::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArg {
    Github,
    Local,
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Github => Target::Vcs,
            TargetArg::Local => Target::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(EnvArg::Staging, vec![Environment::Staging])]
    #[case(EnvArg::Production, vec![Environment::Production])]
    #[case(EnvArg::All, vec![Environment::Staging, Environment::Production])]
    fn test_environments(#[case] arg: EnvArg, #[case] expected: Vec<Environment>) {
        assert_eq!(arg.environments(), expected);
    }

    #[test]
    fn test_parse_push() {
        let cli = Cli::parse_from(["confsync", "--dry-run", "push", "--env", "production", "--prune"]);
        assert!(cli.dry_run);
        let Command::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.env, EnvArg::Production);
        assert_eq!(args.options(), SyncOptions { folder: None, prune: true });
    }

    #[test]
    fn test_parse_handle_event() {
        let cli = Cli::parse_from(["confsync", "handle-event", "--target", "github", "event.json"]);
        let Command::HandleEvent { target, file } = cli.command else {
            panic!("expected handle-event");
        };
        assert_eq!(Target::from(target), Target::Vcs);
        assert_eq!(file, PathBuf::from("event.json"));
    }

    #[test]
    fn test_parse_folders() {
        let cli = Cli::parse_from(["confsync", "folders", "add-folder", "database", "Database settings", "db-config"]);
        let Command::Folders {
            command: FolderCommand::AddFolder { local_base, .. },
        } = cli.command
        else {
            panic!("expected folders add-folder");
        };
        assert_eq!(local_base, "config");
    }
}
