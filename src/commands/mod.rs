mod event;
mod folders;
mod monitor;
mod sync;

use crate::backends;
use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use confsync_config::{Registry, SyncConfig};
use confsync_sync::Context;
use exn::ResultExt;

pub async fn run(cli: Cli) -> Result<()> {
    let config = SyncConfig::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let registry = Registry::load(&config.registry).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Push(args) => sync::push(&context(config, registry, cli.dry_run).await?, &args).await,
        Command::Pull(args) => sync::pull(&context(config, registry, cli.dry_run).await?, &args).await,
        Command::Mirror(args) => sync::mirror(&context(config, registry, cli.dry_run).await?, &args).await,
        Command::Monitor { env } => {
            monitor::run(&context(config, registry, cli.dry_run).await?, &env.environments()).await
        },
        Command::HandleEvent { target, file } => {
            event::run(&context(config, registry, cli.dry_run).await?, target.into(), &file).await
        },
        Command::Folders { command } => folders::run(&config, registry, command, cli.dry_run).await,
    }
}

async fn context(config: SyncConfig, registry: Registry, dry_run: bool) -> Result<Context> {
    if dry_run {
        tracing::info!("Dry run: nothing will be written");
    }
    let local = backends::local(&config, dry_run)?;
    let store = backends::object_store(&config, dry_run).await?;
    let vcs = backends::vcs(&config, dry_run)?;
    Context::new(config, registry, local, store, vcs).or_raise(|| ErrorKind::Config)
}
