//! Client-side synchronization for the shared household document.
//!
//! The [`engine::SyncEngine`] owns the authoritative in-memory document,
//! applies local mutations optimistically, debounces merge-writes to the
//! remote store, and reconciles every incoming snapshot defensively. The
//! [`identity::IdentityResolver`] answers "who is using this device" from the
//! durable device id plus the remote binding registry.

mod error;
pub mod engine;
pub mod identity;
pub mod listeners;
pub mod patch;
pub mod sanitize;
pub mod ticker;

pub use engine::{ConnectionPhase, EngineStatus, SyncEngine};
pub use error::{Result, SyncError};
pub use identity::IdentityResolver;
pub use listeners::{ListenerId, Listeners};
pub use patch::DocumentPatch;
pub use ticker::{spawn_timer_ticker, TickerGuard};
