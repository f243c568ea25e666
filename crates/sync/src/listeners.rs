//! Per-instance change-listener registry.
//!
//! Each engine or resolver owns its own registry; nothing is process-global,
//! so two instances in one process (or one test) never observe each other's
//! notifications.

use std::collections::HashMap;
use std::sync::Mutex;

/// Handle identifying one subscription within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Subscribe/unsubscribe registry with an emit-on-mutation call.
pub struct Listeners<T> {
    inner: Mutex<Registry<T>>,
}

struct Registry<T> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<T>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Registry {
                next_id: 0,
                callbacks: HashMap::new(),
            }),
        }
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.insert(id, Box::new(callback));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.callbacks.remove(&id.0);
    }

    /// Invoke every registered callback with the new value.
    pub fn emit(&self, value: &T) {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        for callback in inner.callbacks.values() {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
