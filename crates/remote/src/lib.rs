//! Remote document store adapter.
//!
//! Wraps the hosted realtime document database behind a minimal interface:
//! point reads, merge-writes of named top-level fields, and a subscription
//! delivering the full document on every change. The REST implementation
//! talks to the hosted service; the in-memory implementation backs tests and
//! demo mode.

mod error;
mod memory;
mod rest;
mod store;

pub use error::{Result, RetryClass, StoreError};
pub use memory::MemoryDocumentStore;
pub use rest::{RestDocumentStore, RestStoreConfig};
pub use store::{DocumentFields, DocumentPath, DocumentStore, DocumentSubscription, SnapshotEvent};
