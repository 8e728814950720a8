pub mod backend;
pub mod error;
pub mod fingerprint;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::{FileInfo, Metadata, Object};
pub use crate::path::{to_key as path_to_key, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
