//! Durable per-device identity and small device-mode preference.

use uuid::Uuid;

use crate::error::Result;
use crate::kv::KeyValueStore;

const DEVICE_ID_KEY: &str = "device_id_v1";
const DEVICE_MODE_KEY: &str = "device_mode_v1";

/// Return this device's stable identifier, generating and persisting one on
/// first run. The id is never regenerated unless local storage is cleared.
pub fn load_or_create_device_id(store: &dyn KeyValueStore) -> Result<String> {
    if let Some(existing) = store.get(DEVICE_ID_KEY)? {
        if !existing.trim().is_empty() {
            return Ok(existing);
        }
    }
    let id = format!("dev_{}", Uuid::new_v4().simple());
    store.set(DEVICE_ID_KEY, &id)?;
    Ok(id)
}

/// Last-known device mode ("parent"/"child"), cached so the mode gate renders
/// before the remote binding record arrives.
pub fn cached_device_mode(store: &dyn KeyValueStore) -> Option<String> {
    store.get(DEVICE_MODE_KEY).ok().flatten()
}

pub fn set_cached_device_mode(store: &dyn KeyValueStore, mode: &str) -> Result<()> {
    store.set(DEVICE_MODE_KEY, mode)
}
