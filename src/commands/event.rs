//! `handle-event`: the entry point the object-store notification hooks call.

use super::sync::{drain, finish};
use crate::error::{ErrorKind, Result};
use confsync_sync::{Context, Summary, Target, handle, parse_event};
use exn::ResultExt;
use std::path::Path;
use tokio::io::AsyncReadExt;

pub async fn run(ctx: &Context, target: Target, file: &Path) -> Result<()> {
    let data = read(file).await.or_raise(|| ErrorKind::EventFile(file.to_path_buf()))?;
    let event = parse_event(&data).or_raise(|| ErrorKind::EventFile(file.to_path_buf()))?;
    tracing::info!(%target, records = event.records.len(), "Handling object-store event");
    let mut summary = Summary::default();
    drain(&mut summary, handle(ctx, &event, target), "event handling").await?;
    finish(&summary)
}

async fn read(file: &Path) -> std::io::Result<Vec<u8>> {
    if file == Path::new("-") {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        return Ok(data);
    }
    tokio::fs::read(file).await
}
