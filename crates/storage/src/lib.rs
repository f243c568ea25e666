//! Device-local durable storage: the string-keyed key-value store, the
//! household snapshot cache built on top of it, and the durable device
//! identity.

mod device;
mod error;
mod kv;
mod snapshot_cache;

pub use device::{cached_device_mode, load_or_create_device_id, set_cached_device_mode};
pub use error::{Result, StorageError};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use snapshot_cache::SnapshotCache;
