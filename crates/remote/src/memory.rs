//! In-process document store used by tests and demo mode.
//!
//! Implements the same merge and subscription semantics as the hosted
//! service: merge-writes replace only the named top-level fields, and every
//! write fans the full document out to all subscribers, including the writer
//! itself (the echo the sync engine relies on).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, StoreError};
use crate::store::{
    DocumentFields, DocumentPath, DocumentStore, DocumentSubscription, SnapshotEvent,
};

#[derive(Default)]
struct Inner {
    documents: HashMap<String, DocumentFields>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<SnapshotEvent>>>,
}

/// In-memory [`DocumentStore`] with test controls.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
    deny_auth: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(inner: &mut Inner, path: &str) {
        let Some(fields) = inner.documents.get(path).cloned() else {
            return;
        };
        if let Some(senders) = inner.subscribers.get_mut(path) {
            senders.retain(|tx| tx.send(SnapshotEvent::Snapshot(fields.clone())).is_ok());
        }
    }

    /// Make `ensure_auth` fail until cleared; simulates an unreachable or
    /// rejecting auth service.
    pub fn set_deny_auth(&self, deny: bool) {
        self.deny_auth.store(deny, Ordering::Relaxed);
    }

    /// Make the next `subscribe` calls fail; simulates listener setup failure.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Test helper: replace the raw document (no merge) and notify
    /// subscribers, exactly as a foreign device's write would arrive. The
    /// fields may be arbitrarily malformed.
    pub fn push_raw_snapshot(&self, path: &DocumentPath, fields: DocumentFields) {
        let mut inner = self.lock();
        inner.documents.insert(path.to_string(), fields);
        Self::notify(&mut inner, &path.to_string());
    }

    /// Test helper: terminate every subscription on `path` with a lost event.
    pub fn break_subscriptions(&self, path: &DocumentPath) {
        let mut inner = self.lock();
        if let Some(senders) = inner.subscribers.remove(&path.to_string()) {
            for tx in senders {
                let _ = tx.send(SnapshotEvent::Lost(StoreError::subscription_lost(
                    "listener terminated by test",
                )));
            }
        }
    }

    /// Test helper: current raw document contents.
    pub fn document(&self, path: &DocumentPath) -> Option<DocumentFields> {
        self.lock().documents.get(&path.to_string()).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_auth(&self) -> Result<()> {
        if self.deny_auth.load(Ordering::Relaxed) {
            return Err(StoreError::auth("auth denied by test"));
        }
        Ok(())
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<DocumentFields>> {
        Ok(self.lock().documents.get(&path.to_string()).cloned())
    }

    async fn write_merge(&self, path: &DocumentPath, fields: DocumentFields) -> Result<()> {
        if fields.is_empty() {
            return Err(StoreError::invalid_request("Empty merge-write field map"));
        }
        let key = path.to_string();
        let mut inner = self.lock();
        let document = inner.documents.entry(key.clone()).or_default();
        for (field, value) in fields {
            document.insert(field, value);
        }
        Self::notify(&mut inner, &key);
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<DocumentSubscription> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(StoreError::subscription_lost("subscribe failed by test"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let key = path.to_string();
        let mut inner = self.lock();
        // Deliver the current document immediately, as the hosted listener does.
        if let Some(fields) = inner.documents.get(&key).cloned() {
            let _ = tx.send(SnapshotEvent::Snapshot(fields));
        }
        inner.subscribers.entry(key).or_default().push(tx);
        Ok(DocumentSubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> DocumentPath {
        DocumentPath::new("households", "fam-1").unwrap()
    }

    fn fields(raw: serde_json::Value) -> DocumentFields {
        raw.as_object().cloned().expect("object literal")
    }

    #[tokio::test]
    async fn merge_write_keeps_unnamed_fields() {
        let store = MemoryDocumentStore::new();
        store
            .write_merge(&path(), fields(serde_json::json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        store
            .write_merge(&path(), fields(serde_json::json!({"a": 10})))
            .await
            .unwrap();

        let doc = store.read(&path()).await.unwrap().unwrap();
        assert_eq!(doc["a"], 10);
        assert_eq!(doc["b"], 2);
    }

    #[tokio::test]
    async fn writer_receives_its_own_echo() {
        let store = MemoryDocumentStore::new();
        let mut subscription = store.subscribe(&path()).await.unwrap();
        store
            .write_merge(&path(), fields(serde_json::json!({"users": []})))
            .await
            .unwrap();

        let SnapshotEvent::Snapshot(snapshot) = subscription.next().await.unwrap() else {
            panic!("expected snapshot event");
        };
        assert!(snapshot.contains_key("users"));
    }

    #[tokio::test]
    async fn subscription_starts_with_current_document() {
        let store = MemoryDocumentStore::new();
        store
            .write_merge(&path(), fields(serde_json::json!({"n": 1})))
            .await
            .unwrap();
        let mut subscription = store.subscribe(&path()).await.unwrap();
        let SnapshotEvent::Snapshot(snapshot) = subscription.next().await.unwrap() else {
            panic!("expected initial snapshot");
        };
        assert_eq!(snapshot["n"], 1);
    }

    #[tokio::test]
    async fn dropped_subscription_stops_receiving() {
        let store = MemoryDocumentStore::new();
        let subscription = store.subscribe(&path()).await.unwrap();
        drop(subscription);
        store
            .write_merge(&path(), fields(serde_json::json!({"n": 1})))
            .await
            .unwrap();
        // The dead sender was pruned on notify.
        assert!(store.lock().subscribers.get("households/fam-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn break_subscriptions_delivers_lost() {
        let store = MemoryDocumentStore::new();
        let mut subscription = store.subscribe(&path()).await.unwrap();
        store.break_subscriptions(&path());
        assert!(matches!(
            subscription.next().await,
            Some(SnapshotEvent::Lost(_))
        ));
        // Channel closes afterwards.
        assert!(subscription.next().await.is_none());
    }
}
