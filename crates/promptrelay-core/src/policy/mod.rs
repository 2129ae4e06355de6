//! Live-reloadable gateway policy: whitelist, concurrency cap, key material.

pub mod snapshot;
pub mod store;
pub mod watcher;

pub use snapshot::{PolicySnapshot, DEFAULT_MAX_CONCURRENT};
pub use store::{normalize_key_material, PolicyFile, PolicyStore};
pub use watcher::PolicyWatcher;
