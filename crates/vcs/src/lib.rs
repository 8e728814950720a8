pub mod backend;
pub mod error;
mod models;

pub use crate::backend::VcsBackend;
pub use crate::models::{TreeChange, TreeEntry, VcsFile};
use std::sync::Arc;

pub type VcsHandle = Arc<dyn VcsBackend + Send + Sync>;
