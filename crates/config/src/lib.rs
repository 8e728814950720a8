mod environment;
pub mod error;
mod registry;
mod settings;
mod validate;

pub use crate::environment::Environment;
pub use crate::registry::{Folder, MONITORED_SUFFIX, MonitoredPrefix, Registry, TrackedFile};
pub use crate::settings::{Branches, GitHubConfig, StoreConfig, SyncConfig};
