//! Identity/session resolution: which person operates this device.
//!
//! Combines the durable device id with a binding record in the per-family
//! device registry document. One top-level field per device id keeps the
//! registry merge-writable without cross-device clobbering, and lets the
//! parent dashboard list every family device with its heartbeat staleness.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use serde_json::json;
use tokio::task::JoinHandle;

use weekplan_core::model::{DeviceBinding, Person, Role};
use weekplan_remote::{DocumentFields, DocumentPath, DocumentStore, SnapshotEvent};
use weekplan_storage::{load_or_create_device_id, set_cached_device_mode, KeyValueStore};

use crate::error::Result;
use crate::listeners::{ListenerId, Listeners};
use crate::sanitize::sanitize;

/// Interval between `lastSeen` refreshes.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

type DeviceMap = BTreeMap<String, DeviceBinding>;

/// Resolves and tracks this device's binding within the family registry.
pub struct IdentityResolver {
    device_id: String,
    path: DocumentPath,
    store: Arc<dyn DocumentStore>,
    kv: Arc<dyn KeyValueStore>,
    devices: RwLock<DeviceMap>,
    listeners: Listeners<DeviceMap>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IdentityResolver {
    /// Resolve the durable device id, ensure a binding record exists for it,
    /// subscribe to registry changes and start the heartbeat.
    pub async fn connect(
        store: Arc<dyn DocumentStore>,
        kv: Arc<dyn KeyValueStore>,
        fam_id: &str,
    ) -> Result<Arc<Self>> {
        let device_id = load_or_create_device_id(kv.as_ref())?;
        let path = DocumentPath::new("device_registries", fam_id)?;

        if let Err(err) = store.ensure_auth().await {
            // Offline start: the resolver still serves the durable device id
            // and a local default binding.
            warn!("[Identity] Authentication failed; registry is read-later: {}", err);
        }

        let resolver = Arc::new(Self {
            device_id: device_id.clone(),
            path: path.clone(),
            store: Arc::clone(&store),
            kv,
            devices: RwLock::new(DeviceMap::new()),
            listeners: Listeners::new(),
            tasks: Mutex::new(Vec::new()),
        });

        if let Ok(Some(raw)) = store.read(&path).await {
            resolver.apply_registry_snapshot(&raw);
        }

        // Lazily create (or refresh) this device's own binding.
        let binding = match resolver.current_binding() {
            Some(existing) => DeviceBinding {
                fam_id: fam_id.to_string(),
                last_seen: Utc::now(),
                ..existing
            },
            None => DeviceBinding {
                device_id: device_id.clone(),
                fam_id: fam_id.to_string(),
                label: "New device".to_string(),
                role: Role::Parent,
                user_id: None,
                force_child_mode: false,
                last_seen: Utc::now(),
                platform: std::env::consts::OS.to_string(),
            },
        };
        // A failed registry write is not fatal: the local binding keeps the
        // device usable and the next heartbeat retries.
        if let Err(err) = resolver.write_own_binding(binding).await {
            warn!("[Identity] Failed to persist device binding: {}", err);
        }

        match store.subscribe(&path).await {
            Ok(mut subscription) => {
                // Weak reference: a resolver dropped by its owner must not be
                // kept alive by its own listener task.
                let inner = Arc::downgrade(&resolver);
                let apply = tokio::spawn(async move {
                    while let Some(event) = subscription.next().await {
                        let Some(resolver) = inner.upgrade() else {
                            break;
                        };
                        match event {
                            SnapshotEvent::Snapshot(raw) => resolver.apply_registry_snapshot(&raw),
                            SnapshotEvent::Lost(err) => {
                                warn!(
                                    "[Identity] Registry listener lost; bindings may go stale: {}",
                                    err
                                );
                                break;
                            }
                        }
                    }
                });
                resolver.lock_tasks().push(apply);
            }
            Err(err) => {
                // Stale bindings are tolerable; the resolver keeps serving
                // whatever it has.
                warn!("[Identity] Registry subscription failed: {}", err);
            }
        }

        let inner = Arc::downgrade(&resolver);
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                let Some(resolver) = inner.upgrade() else {
                    break;
                };
                if let Err(err) = resolver.touch().await {
                    debug!("[Identity] Heartbeat failed: {}", err);
                }
            }
        });
        resolver.lock_tasks().push(heartbeat);

        Ok(resolver)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// This device's binding record, if known yet.
    pub fn current_binding(&self) -> Option<DeviceBinding> {
        self.read_devices().get(&self.device_id).cloned()
    }

    /// Every binding in the family registry, most recently seen first; the
    /// parent device-management view renders staleness from `last_seen`.
    pub fn family_devices(&self) -> Vec<DeviceBinding> {
        let mut devices: Vec<DeviceBinding> = self.read_devices().values().cloned().collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        devices
    }

    /// The role this device acts as: a forced child mode wins over the bound
    /// role, and an unknown device defaults to parent (first-run behavior).
    pub fn effective_role(&self) -> Role {
        match self.current_binding() {
            Some(binding) if binding.force_child_mode => Role::Child,
            Some(binding) => binding.role,
            None => Role::Parent,
        }
    }

    /// Whether this viewer may perform parent-only mutations. The PIN
    /// challenge itself is owned by the presentation layer.
    pub fn can_mutate(&self) -> bool {
        self.effective_role() == Role::Parent
    }

    /// The person this device should display: the bound user while it exists,
    /// else the first person of the expected role, else the first person.
    /// A stale binding therefore never renders an empty view.
    pub fn resolve_visible_user<'a>(&self, users: &'a [Person]) -> Option<&'a Person> {
        if let Some(binding) = self.current_binding() {
            if let Some(user_id) = binding.user_id.as_deref() {
                if let Some(person) = users.iter().find(|person| person.id == user_id) {
                    return Some(person);
                }
            }
        }
        users
            .iter()
            .find(|person| person.role == Role::Child)
            .or_else(|| users.first())
    }

    /// Subscribe to registry changes; fired with the full device map.
    pub fn subscribe_changes(
        &self,
        listener: impl Fn(&DeviceMap) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe_changes(&self, id: ListenerId) {
        self.listeners.unsubscribe(id);
    }

    /// Bind (or unbind) this device to a person.
    pub async fn bind_device_to_user(&self, user_id: Option<String>) -> Result<()> {
        self.mutate_own_binding(|binding| binding.user_id = user_id.clone())
            .await
    }

    pub async fn set_role(&self, role: Role) -> Result<()> {
        self.mutate_own_binding(|binding| binding.role = role).await
    }

    pub async fn set_label(&self, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        self.mutate_own_binding(move |binding| binding.label = label.clone())
            .await
    }

    pub async fn set_force_child_mode(&self, value: bool) -> Result<()> {
        self.mutate_own_binding(|binding| binding.force_child_mode = value)
            .await
    }

    /// Refresh this device's `lastSeen`. Called by the heartbeat task; public
    /// so a foregrounding app can refresh eagerly.
    pub async fn touch(&self) -> Result<()> {
        self.mutate_own_binding(|_| {}).await
    }

    /// Stop the heartbeat and registry listener.
    pub fn shutdown(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    async fn mutate_own_binding(&self, mutate: impl Fn(&mut DeviceBinding)) -> Result<()> {
        let mut binding = self.current_binding().ok_or_else(|| {
            weekplan_remote::StoreError::invalid_request("Device binding not initialized")
        })?;
        mutate(&mut binding);
        binding.last_seen = Utc::now();
        self.write_own_binding(binding).await
    }

    async fn write_own_binding(&self, binding: DeviceBinding) -> Result<()> {
        // Optimistic local update first, mirroring the engine's save path.
        {
            let mut devices = self.write_devices();
            devices.insert(self.device_id.clone(), binding.clone());
        }
        self.cache_device_mode(&binding);
        let devices = self.read_devices().clone();
        self.listeners.emit(&devices);

        let value = sanitize(serde_json::to_value(&binding)?).unwrap_or_else(|| json!({}));
        let mut fields = DocumentFields::new();
        fields.insert(self.device_id.clone(), value);
        self.store.write_merge(&self.path, fields).await?;
        Ok(())
    }

    fn apply_registry_snapshot(&self, raw: &DocumentFields) {
        let mut next = DeviceMap::new();
        for (device_id, value) in raw {
            match serde_json::from_value::<DeviceBinding>(value.clone()) {
                Ok(binding) => {
                    next.insert(device_id.clone(), binding);
                }
                Err(err) => warn!(
                    "[Identity] Ignoring malformed binding record '{}': {}",
                    device_id, err
                ),
            }
        }
        let changed = {
            let mut devices = self.write_devices();
            if *devices == next {
                false
            } else {
                *devices = next;
                true
            }
        };
        if changed {
            if let Some(binding) = self.current_binding() {
                self.cache_device_mode(&binding);
            }
            let devices = self.read_devices().clone();
            self.listeners.emit(&devices);
        }
    }

    fn cache_device_mode(&self, binding: &DeviceBinding) {
        let mode = if binding.force_child_mode {
            "child"
        } else {
            match binding.role {
                Role::Parent => "parent",
                Role::Child => "child",
            }
        };
        if let Err(err) = set_cached_device_mode(self.kv.as_ref(), mode) {
            debug!("[Identity] Failed to cache device mode: {}", err);
        }
    }

    fn read_devices(&self) -> std::sync::RwLockReadGuard<'_, DeviceMap> {
        self.devices.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_devices(&self) -> std::sync::RwLockWriteGuard<'_, DeviceMap> {
        self.devices.write().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for IdentityResolver {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekplan_core::model::Person;
    use weekplan_remote::MemoryDocumentStore;
    use weekplan_storage::MemoryStore;

    async fn resolver_with_store() -> (Arc<IdentityResolver>, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let kv = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::connect(store.clone(), kv, "fam-1")
            .await
            .unwrap();
        (resolver, store)
    }

    fn person(id: &str, role: Role) -> Person {
        Person {
            id: id.to_string(),
            name: id.to_string(),
            role,
            avatar: String::new(),
            pin: None,
        }
    }

    #[tokio::test]
    async fn first_run_creates_a_parent_binding() {
        let (resolver, store) = resolver_with_store().await;
        let binding = resolver.current_binding().expect("binding created");
        assert_eq!(binding.role, Role::Parent);
        assert_eq!(binding.user_id, None);
        assert!(!binding.force_child_mode);

        // The registry document carries exactly one field: this device.
        let path = DocumentPath::new("device_registries", "fam-1").unwrap();
        let raw = store.document(&path).expect("registry written");
        assert_eq!(raw.len(), 1);
        assert!(raw.contains_key(resolver.device_id()));
        // The unbound user id is stripped, not stored as null.
        let serialized = serde_json::to_string(&raw[resolver.device_id()]).unwrap();
        assert!(!serialized.contains("userId"));
        resolver.shutdown();
    }

    #[tokio::test]
    async fn device_id_is_stable_across_sessions() {
        let store = Arc::new(MemoryDocumentStore::new());
        let kv = Arc::new(MemoryStore::new());
        let first = IdentityResolver::connect(store.clone(), kv.clone(), "fam-1")
            .await
            .unwrap();
        let first_id = first.device_id().to_string();
        first.shutdown();

        let second = IdentityResolver::connect(store, kv, "fam-1").await.unwrap();
        assert_eq!(second.device_id(), first_id);
        second.shutdown();
    }

    #[tokio::test]
    async fn binding_mutations_are_field_scoped_merge_writes() {
        let (resolver, store) = resolver_with_store().await;
        let path = DocumentPath::new("device_registries", "fam-1").unwrap();

        // A sibling device already exists in the registry.
        let mut sibling_fields = DocumentFields::new();
        sibling_fields.insert(
            "dev_sibling".to_string(),
            serde_json::to_value(DeviceBinding {
                device_id: "dev_sibling".into(),
                fam_id: "fam-1".into(),
                label: "Kitchen tablet".into(),
                role: Role::Child,
                user_id: Some("u_leon".into()),
                force_child_mode: true,
                last_seen: Utc::now(),
                platform: "linux".into(),
            })
            .unwrap(),
        );
        store.write_merge(&path, sibling_fields).await.unwrap();

        resolver
            .bind_device_to_user(Some("u_lina".to_string()))
            .await
            .unwrap();
        resolver.set_label("Hallway tablet").await.unwrap();

        let raw = store.document(&path).unwrap();
        // Sibling untouched, own binding updated.
        assert_eq!(raw["dev_sibling"]["label"], "Kitchen tablet");
        assert_eq!(raw[resolver.device_id()]["userId"], "u_lina");
        assert_eq!(raw[resolver.device_id()]["label"], "Hallway tablet");
        resolver.shutdown();
    }

    #[tokio::test]
    async fn touch_advances_last_seen() {
        let (resolver, _store) = resolver_with_store().await;
        let before = resolver.current_binding().unwrap().last_seen;
        tokio::time::sleep(Duration::from_millis(5)).await;
        resolver.touch().await.unwrap();
        let after = resolver.current_binding().unwrap().last_seen;
        assert!(after > before);
        resolver.shutdown();
    }

    #[tokio::test]
    async fn forced_child_mode_gates_mutation() {
        let (resolver, _store) = resolver_with_store().await;
        assert!(resolver.can_mutate());
        resolver.set_force_child_mode(true).await.unwrap();
        assert_eq!(resolver.effective_role(), Role::Child);
        assert!(!resolver.can_mutate());
        resolver.shutdown();
    }

    #[tokio::test]
    async fn visible_user_falls_back_when_binding_is_stale() {
        let (resolver, _store) = resolver_with_store().await;
        resolver
            .bind_device_to_user(Some("u_gone".to_string()))
            .await
            .unwrap();

        let users = vec![person("u_papa", Role::Parent), person("u_lina", Role::Child)];
        // Bound user no longer exists: first child wins.
        let visible = resolver.resolve_visible_user(&users).unwrap();
        assert_eq!(visible.id, "u_lina");

        // No children at all: first person wins over rendering nothing.
        let parents_only = vec![person("u_papa", Role::Parent)];
        let visible = resolver.resolve_visible_user(&parents_only).unwrap();
        assert_eq!(visible.id, "u_papa");
        resolver.shutdown();
    }

    #[tokio::test]
    async fn registry_snapshot_rederives_identity_reactively() {
        let (resolver, store) = resolver_with_store().await;
        let path = DocumentPath::new("device_registries", "fam-1").unwrap();

        let mut binding = resolver.current_binding().unwrap();
        binding.user_id = Some("u_leon".to_string());
        binding.role = Role::Child;
        let mut fields = DocumentFields::new();
        fields.insert(
            resolver.device_id().to_string(),
            serde_json::to_value(&binding).unwrap(),
        );
        store.write_merge(&path, fields).await.unwrap();

        // Give the subscription task a moment to apply the push.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let current = resolver.current_binding().unwrap();
        assert_eq!(current.user_id.as_deref(), Some("u_leon"));
        assert_eq!(resolver.effective_role(), Role::Child);
        resolver.shutdown();
    }
}
