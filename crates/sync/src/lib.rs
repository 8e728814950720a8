//! Loop-safe synchronization of JSON configuration files between an object
//! store, a VCS host and a local tree.
//!
//! Every entry point takes a [`Context`] and works file by file: resolve where
//! the file lives, read both sides, [`decide`](decide::decide), then
//! [`execute`](execute::Executor). Long-running operations return a stream of
//! [`SyncEvent`]s that [`Summary::collect`] turns into a run summary.

mod context;
pub mod decide;
pub mod error;
pub mod execute;
pub mod handler;
mod mirror;
mod monitor;
pub mod provenance;
mod pull;
mod push;
mod record;
mod report;
pub mod resolve;
mod state;

pub use crate::context::{Context, RefLocks, SyncOptions};
pub use crate::handler::{S3Event, Target, handle, parse_event};
pub use crate::mirror::mirror;
pub use crate::monitor::{FileState, monitor};
pub use crate::pull::pull;
pub use crate::push::push;
pub use crate::record::{Backend, SyncRecord};
pub use crate::report::{FileReport, FileStatus, Skipped, Summary, SyncEvent};
