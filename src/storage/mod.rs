//! Persistent key-value storage
//! 
//! Routines and the notification permission are stored as JSON values under
//! fixed keys. Reads fail soft; writes overwrite the whole value.

pub mod file_store;
pub mod memory_store;
pub mod routines;

use crate::error::Result;

// Re-export main types
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use routines::{load_permission, load_routines, save_permission, save_routines};

/// Key holding the JSON array of routines
pub const ROUTINES_KEY: &str = "routines";
/// Key holding the last known notification permission
pub const PERMISSION_KEY: &str = "notificationPermission";

/// Minimal durable string store
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, `None` if it was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`
    fn put(&self, key: &str, value: &str) -> Result<()>;
}
