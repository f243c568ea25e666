//! Write-through cache of the last-known household document.
//!
//! One key per top-level collection. The cache makes the UI usable before the
//! remote connection completes and keeps it working offline; it is refreshed
//! on every authoritative change, so it is never more than one state-update
//! behind the in-memory truth.

use std::sync::Arc;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use weekplan_core::document::{Collection, HouseholdDocument};
use weekplan_core::seed;

use crate::error::Result;
use crate::kv::KeyValueStore;

fn cache_key(collection: Collection) -> String {
    format!("household_{}_v1", collection.field_name())
}

/// Snapshot cache over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load every cached collection into a document.
    ///
    /// Missing keys yield that collection's empty default; corrupt values are
    /// discarded with a warning. A cache with no collection keys at all is a
    /// first run and yields the seed document instead.
    pub fn load_all(&self) -> HouseholdDocument {
        let mut any_present = false;
        let mut doc = HouseholdDocument::default();
        for collection in Collection::ALL {
            let Some(raw) = self.read_raw(collection) else {
                continue;
            };
            any_present = true;
            match collection {
                Collection::Users => self.parse_into(collection, &raw, &mut doc.users),
                Collection::Tasks => self.parse_into(collection, &raw, &mut doc.tasks),
                Collection::Library => self.parse_into(collection, &raw, &mut doc.library),
                Collection::Suppressions => {
                    self.parse_into(collection, &raw, &mut doc.suppressions)
                }
                Collection::Completions => self.parse_into(collection, &raw, &mut doc.completions),
                Collection::Timers => self.parse_into(collection, &raw, &mut doc.timers),
                Collection::SortOrders => self.parse_into(collection, &raw, &mut doc.sort_orders),
                Collection::BlockOverrides => {
                    self.parse_into(collection, &raw, &mut doc.block_overrides)
                }
                Collection::Planned => self.parse_into(collection, &raw, &mut doc.planned),
            }
        }
        if any_present {
            doc
        } else {
            seed::seed_document()
        }
    }

    /// Write-through one collection's current value.
    pub fn persist(&self, collection: Collection, doc: &HouseholdDocument) -> Result<()> {
        match collection {
            Collection::Users => self.write(collection, &doc.users),
            Collection::Tasks => self.write(collection, &doc.tasks),
            Collection::Library => self.write(collection, &doc.library),
            Collection::Suppressions => self.write(collection, &doc.suppressions),
            Collection::Completions => self.write(collection, &doc.completions),
            Collection::Timers => self.write(collection, &doc.timers),
            Collection::SortOrders => self.write(collection, &doc.sort_orders),
            Collection::BlockOverrides => self.write(collection, &doc.block_overrides),
            Collection::Planned => self.write(collection, &doc.planned),
        }
    }

    /// Persist every collection; used after bootstrap replaces the document.
    pub fn persist_all(&self, doc: &HouseholdDocument) -> Result<()> {
        for collection in Collection::ALL {
            self.persist(collection, doc)?;
        }
        Ok(())
    }

    fn read_raw(&self, collection: Collection) -> Option<String> {
        match self.store.get(&cache_key(collection)) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "[SnapshotCache] Failed to read {}: {}",
                    collection.field_name(),
                    err
                );
                None
            }
        }
    }

    fn parse_into<T: DeserializeOwned>(&self, collection: Collection, raw: &str, slot: &mut T) {
        match serde_json::from_str(raw) {
            Ok(value) => *slot = value,
            Err(err) => {
                warn!(
                    "[SnapshotCache] Discarding corrupt cache entry for {}: {}",
                    collection.field_name(),
                    err
                );
                let _ = self.store.remove(&cache_key(collection));
            }
        }
    }

    fn write<T: Serialize>(&self, collection: Collection, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&cache_key(collection), &raw)?;
        Ok(())
    }
}
