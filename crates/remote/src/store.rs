//! The document store contract consumed by the sync engine.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, StoreError};

/// Top-level fields of one remote document.
pub type DocumentFields = serde_json::Map<String, serde_json::Value>;

/// Address of one document: `"collection/documentId"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    document_id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, document_id: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        let document_id = document_id.into();
        if collection.is_empty() || collection.contains('/') {
            return Err(StoreError::invalid_request(format!(
                "Invalid collection name '{}'",
                collection
            )));
        }
        if document_id.is_empty() || document_id.contains('/') {
            return Err(StoreError::invalid_request(format!(
                "Invalid document id '{}'",
                document_id
            )));
        }
        Ok(Self {
            collection,
            document_id,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.document_id)
    }
}

/// One delivery on a document subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// The full current document, pushed on every change (including the echo
    /// of this device's own writes).
    Snapshot(DocumentFields),
    /// The listener failed past its retry budget and delivers nothing more.
    Lost(StoreError),
}

/// A live document subscription. Dropping it unsubscribes: the producer stops
/// and no further events are delivered.
#[derive(Debug)]
pub struct DocumentSubscription {
    receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl DocumentSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<SnapshotEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.receiver.recv().await
    }
}

/// Subscribe/read/write primitives of the hosted document database.
///
/// Implementations must establish authentication in `ensure_auth` before any
/// read or write is attempted, and must serialize conflicting writes at the
/// document-field level (last write per top-level field wins).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish (or refresh) authentication with the backing service.
    async fn ensure_auth(&self) -> Result<()>;

    /// Point read. `None` when the document does not exist.
    async fn read(&self, path: &DocumentPath) -> Result<Option<DocumentFields>>;

    /// Merge-write: update exactly the named top-level fields, leaving all
    /// other fields of the document untouched.
    async fn write_merge(&self, path: &DocumentPath, fields: DocumentFields) -> Result<()>;

    /// Open a realtime subscription delivering the full document on every
    /// change.
    async fn subscribe(&self, path: &DocumentPath) -> Result<DocumentSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_formats_as_collection_slash_id() {
        let path = DocumentPath::new("households", "fam-0001").unwrap();
        assert_eq!(path.to_string(), "households/fam-0001");
    }

    #[test]
    fn path_rejects_separators_and_empties() {
        assert!(DocumentPath::new("", "x").is_err());
        assert!(DocumentPath::new("households", "").is_err());
        assert!(DocumentPath::new("a/b", "x").is_err());
        assert!(DocumentPath::new("households", "x/y").is_err());
    }
}
