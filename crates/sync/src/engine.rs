//! The sync engine: one authoritative in-memory household document per
//! session, optimistic local mutation, debounced merge-writes, defensive
//! remote reconciliation.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use weekplan_core::document::{Collection, HouseholdDocument};
use weekplan_remote::{
    DocumentFields, DocumentPath, DocumentStore, SnapshotEvent,
};
use weekplan_storage::SnapshotCache;

use crate::error::Result;
use crate::listeners::{ListenerId, Listeners};
use crate::patch::{full_document_patch, DocumentPatch};

/// Same-turn saves are coalesced into one merge-write within this window.
const WRITE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Connection lifecycle of one engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Disconnected,
    Authenticating,
    Bootstrapping,
    Live,
    /// The remote connection failed or was lost; the engine keeps serving the
    /// last-known local data and accepts local-only mutations.
    Degraded,
}

/// Connection status surfaced to the presentation layer for banners; never an
/// exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub phase: ConnectionPhase,
    /// Initial data is available (from cache, seed or remote).
    pub ready: bool,
    pub last_error: Option<String>,
}

/// Client-side sync engine for one household document.
pub struct SyncEngine {
    path: DocumentPath,
    store: Arc<dyn DocumentStore>,
    cache: SnapshotCache,
    document: RwLock<HouseholdDocument>,
    status: RwLock<EngineStatus>,
    pending: Mutex<DocumentPatch>,
    flush_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    listeners: Listeners<HouseholdDocument>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine serving local data immediately: the cache contents,
    /// or the seed document on a first run. No remote traffic happens until
    /// [`SyncEngine::connect`].
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: SnapshotCache,
        fam_id: &str,
    ) -> Result<Arc<Self>> {
        let path = DocumentPath::new("households", fam_id)?;
        let document = cache.load_all();
        Ok(Arc::new(Self {
            path,
            store,
            cache,
            document: RwLock::new(document),
            status: RwLock::new(EngineStatus {
                phase: ConnectionPhase::Disconnected,
                ready: false,
                last_error: None,
            }),
            pending: Mutex::new(DocumentPatch::default()),
            flush_tx: Mutex::new(None),
            listeners: Listeners::new(),
            tasks: Mutex::new(Vec::new()),
        }))
    }

    /// Current authoritative in-memory state. Never blocks on the network.
    pub fn get_snapshot(&self) -> HouseholdDocument {
        self.read_document().clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.read_status().clone()
    }

    pub fn ready(&self) -> bool {
        self.read_status().ready
    }

    pub fn last_error(&self) -> Option<String> {
        self.read_status().last_error.clone()
    }

    /// Register a change listener; fired after every optimistic save and
    /// every applied remote snapshot. Registries are per-instance.
    pub fn subscribe_changes(
        &self,
        listener: impl Fn(&HouseholdDocument) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe_changes(&self, id: ListenerId) {
        self.listeners.unsubscribe(id);
    }

    /// Apply a sparse patch: optimistic in-memory update, cache write-through,
    /// listener notification, then a debounced merge-write. Synchronous and
    /// non-blocking; remote failures surface via [`SyncEngine::status`] only.
    pub fn save(&self, patch: DocumentPatch) {
        if patch.is_empty() {
            return;
        }
        let changed = {
            let mut doc = self.write_document();
            patch.apply_to(&mut doc)
        };
        let snapshot = self.get_snapshot();
        for collection in &changed {
            if let Err(err) = self.cache.persist(*collection, &snapshot) {
                warn!(
                    "[HouseholdSync] Cache write for {} failed: {}",
                    collection.field_name(),
                    err
                );
            }
        }
        self.listeners.emit(&snapshot);

        self.lock_pending().merge(patch);
        if let Some(tx) = self.lock_flush_tx().as_ref() {
            let _ = tx.send(());
        }
    }

    /// Reconcile an incoming remote snapshot (including this device's own
    /// echo). Each known collection present with a type-valid value replaces
    /// the in-memory one; malformed or missing fields retain the last-known
    /// good value. Never panics on foreign data.
    pub fn on_remote_snapshot(&self, raw: &DocumentFields) {
        let mut changed = Vec::new();
        {
            let mut doc = self.write_document();
            for collection in Collection::ALL {
                let Some(value) = raw.get(collection.field_name()) else {
                    continue;
                };
                let shape_ok = if collection.is_sequence() {
                    value.is_array()
                } else {
                    value.is_object()
                };
                if !shape_ok {
                    warn!(
                        "[HouseholdSync] Ignoring malformed remote field '{}' (wrong shape)",
                        collection.field_name()
                    );
                    continue;
                }
                match collection {
                    Collection::Users => {
                        Self::apply_field(&mut doc.users, value, collection, &mut changed)
                    }
                    Collection::Tasks => {
                        Self::apply_field(&mut doc.tasks, value, collection, &mut changed)
                    }
                    Collection::Library => {
                        Self::apply_field(&mut doc.library, value, collection, &mut changed)
                    }
                    Collection::Suppressions => {
                        Self::apply_field(&mut doc.suppressions, value, collection, &mut changed)
                    }
                    Collection::Completions => {
                        Self::apply_field(&mut doc.completions, value, collection, &mut changed)
                    }
                    Collection::Timers => {
                        Self::apply_field(&mut doc.timers, value, collection, &mut changed)
                    }
                    Collection::SortOrders => {
                        Self::apply_field(&mut doc.sort_orders, value, collection, &mut changed)
                    }
                    Collection::BlockOverrides => {
                        Self::apply_field(&mut doc.block_overrides, value, collection, &mut changed)
                    }
                    Collection::Planned => {
                        Self::apply_field(&mut doc.planned, value, collection, &mut changed)
                    }
                }
            }
        }
        if changed.is_empty() {
            return;
        }
        let snapshot = self.get_snapshot();
        for collection in &changed {
            if let Err(err) = self.cache.persist(*collection, &snapshot) {
                warn!(
                    "[HouseholdSync] Cache write for {} failed: {}",
                    collection.field_name(),
                    err
                );
            }
        }
        self.listeners.emit(&snapshot);
    }

    /// Authenticate, read-or-create the remote document, then go live on the
    /// realtime subscription. Every failure path degrades to cache-only mode
    /// with a recorded error instead of surfacing an exception.
    pub async fn connect(self: &Arc<Self>) {
        if self.read_status().phase == ConnectionPhase::Live {
            return;
        }
        self.abort_tasks();

        self.set_phase(ConnectionPhase::Authenticating);
        if let Err(err) = self.store.ensure_auth().await {
            warn!(
                "[HouseholdSync] Authentication failed; serving local data only: {}",
                err
            );
            self.enter_degraded(err.to_string());
            return;
        }

        self.set_phase(ConnectionPhase::Bootstrapping);
        match self.store.read(&self.path).await {
            Ok(Some(raw)) => self.on_remote_snapshot(&raw),
            Ok(None) => {
                if let Err(err) = self.create_remote_document().await {
                    warn!("[HouseholdSync] Document create failed: {}", err);
                    self.enter_degraded(err.to_string());
                    return;
                }
            }
            Err(err) => {
                warn!("[HouseholdSync] Bootstrap read failed: {}", err);
                self.enter_degraded(err.to_string());
                return;
            }
        }

        let subscription = match self.store.subscribe(&self.path).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!("[HouseholdSync] Subscription failed: {}", err);
                self.enter_degraded(err.to_string());
                return;
            }
        };

        // Tasks hold weak references so an engine dropped by its owner is not
        // kept alive by its own background work.
        let engine = Arc::downgrade(self);
        let apply = tokio::spawn(async move {
            let mut subscription = subscription;
            while let Some(event) = subscription.next().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                match event {
                    SnapshotEvent::Snapshot(raw) => engine.on_remote_snapshot(&raw),
                    SnapshotEvent::Lost(err) => {
                        warn!(
                            "[HouseholdSync] Realtime listener lost; keeping last-known data: {}",
                            err
                        );
                        engine.enter_degraded(err.to_string());
                        break;
                    }
                }
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        // Flush anything queued while offline.
        let _ = tx.send(());
        *self.lock_flush_tx() = Some(tx);
        let engine = Arc::downgrade(self);
        let writer = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(WRITE_DEBOUNCE).await;
                while rx.try_recv().is_ok() {}
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.flush_pending().await;
            }
        });

        self.lock_tasks().extend([apply, writer]);
        {
            let mut status = self.write_status();
            status.phase = ConnectionPhase::Live;
            status.ready = true;
            status.last_error = None;
        }
        debug!("[HouseholdSync] Live on {}", self.path);
    }

    /// Stop background work. No snapshot is applied and no cache write happens
    /// after this returns.
    pub fn shutdown(&self) {
        self.abort_tasks();
        self.set_phase(ConnectionPhase::Disconnected);
        debug!("[HouseholdSync] Engine for {} shut down", self.path);
    }

    async fn create_remote_document(&self) -> Result<()> {
        let mut fields = full_document_patch(&HouseholdDocument::default()).to_fields()?;
        let now = Utc::now().to_rfc3339();
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        self.store.write_merge(&self.path, fields).await?;
        debug!("[HouseholdSync] Created household document {}", self.path);
        Ok(())
    }

    async fn flush_pending(&self) {
        let patch = std::mem::take(&mut *self.lock_pending());
        if patch.is_empty() {
            return;
        }
        let mut fields = match patch.to_fields() {
            Ok(fields) => fields,
            Err(err) => {
                // Serialization of our own model is a programming error, not
                // a runtime condition; drop the patch loudly.
                log::error!("[HouseholdSync] Failed to serialize patch: {}", err);
                return;
            }
        };
        fields.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));

        match self.store.write_merge(&self.path, fields).await {
            Ok(()) => {
                let mut status = self.write_status();
                if status.phase == ConnectionPhase::Live {
                    status.last_error = None;
                }
            }
            Err(err) => {
                warn!(
                    "[HouseholdSync] Merge-write failed; patch retained for next flush: {}",
                    err
                );
                self.record_error(err.to_string());
                // Put the failed patch back, newer pending changes winning.
                let mut pending = self.lock_pending();
                let mut retained = patch;
                retained.merge(std::mem::take(&mut *pending));
                *pending = retained;
            }
        }
    }

    fn apply_field<T: serde::de::DeserializeOwned + PartialEq>(
        slot: &mut T,
        value: &serde_json::Value,
        collection: Collection,
        changed: &mut Vec<Collection>,
    ) {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(next) => {
                if *slot != next {
                    *slot = next;
                    changed.push(collection);
                }
            }
            Err(err) => warn!(
                "[HouseholdSync] Ignoring malformed remote field '{}': {}",
                collection.field_name(),
                err
            ),
        }
    }

    fn enter_degraded(&self, message: String) {
        let mut status = self.write_status();
        status.phase = ConnectionPhase::Degraded;
        status.ready = true;
        status.last_error = Some(message);
    }

    fn record_error(&self, message: String) {
        self.write_status().last_error = Some(message);
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.write_status().phase = phase;
    }

    fn abort_tasks(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        *self.lock_flush_tx() = None;
    }

    fn read_document(&self) -> std::sync::RwLockReadGuard<'_, HouseholdDocument> {
        self.document.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_document(&self) -> std::sync::RwLockWriteGuard<'_, HouseholdDocument> {
        self.document.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read_status(&self) -> std::sync::RwLockReadGuard<'_, EngineStatus> {
        self.status.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_status(&self) -> std::sync::RwLockWriteGuard<'_, EngineStatus> {
        self.status.write().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, DocumentPatch> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_flush_tx(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<()>>> {
        self.flush_tx.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}
