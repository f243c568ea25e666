//! Error types for the sync crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote document store failure.
    #[error("remote store error: {0}")]
    Store(#[from] weekplan_remote::StoreError),

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] weekplan_storage::StorageError),

    /// A value could not be serialized for the remote document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
