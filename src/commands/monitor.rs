//! `monitor`: print the state of every tracked file.

use crate::error::{ErrorKind, Result};
use confsync_config::Environment;
use confsync_sync::decide::Presence;
use confsync_sync::{Context, FileState};
use exn::ResultExt;

pub async fn run(ctx: &Context, environments: &[Environment]) -> Result<()> {
    let states = confsync_sync::monitor(ctx, environments)
        .await
        .or_raise(|| ErrorKind::Aborted("monitor"))?;
    for state in &states {
        println!("{}", line(state));
    }
    let attention = states.iter().filter(|s| s.status.needs_attention()).count();
    println!("{} tracked, {attention} need attention", states.len());
    Ok(())
}

fn line(state: &FileState) -> String {
    let vcs = state.vcs.as_ref().map_or_else(|| "-".to_string(), short);
    format!(
        "{:<10} {}/{:<30} local={:<8} s3={:<8} github={:<8} {}",
        state.environment,
        state.folder,
        state.file,
        short(&state.local),
        short(&state.object_store),
        vcs,
        state.status
    )
}

/// First eight hex digits of the hash, or `absent`.
fn short(presence: &Presence) -> String {
    match presence.hash() {
        Some(hash) => hash.chars().take(8).collect(),
        None => "absent".to_string(),
    }
}
