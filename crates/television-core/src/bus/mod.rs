// ── Hierarchical event bus ──
//
// Publish/subscribe over dot-delimited channel names with `*` and `**`
// wildcards. Listeners are either persistent (`on`) or fire at most once
// (`once`). There is no listener cap.

mod subscription;
mod trie;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

pub use subscription::{Event, Subscription};
use trie::Trie;

/// Callback invoked with the concrete channel name and the payload.
pub(crate) type Callback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Identifies one registered listener; pass it to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) once: bool,
    pub(crate) callback: Callback,
}

#[derive(Default)]
struct Registry {
    trie: Trie,
    /// Listener id -> the pattern it was registered under.
    patterns: HashMap<ListenerId, Vec<String>>,
}

impl Registry {
    fn remove(&mut self, id: ListenerId) -> bool {
        match self.patterns.remove(&id) {
            Some(pattern) => self.trie.remove(&pattern, id),
            None => false,
        }
    }
}

/// A wildcard-capable publish/subscribe bus.
///
/// Callbacks run synchronously on the emitting task, after the registry
/// lock has been released, so they may freely register or remove
/// listeners themselves.
pub struct EventBus {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a persistent listener on `pattern`.
    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.register(pattern, false, Arc::new(callback))
    }

    /// Register a listener that fires for the first matching event only.
    pub fn once<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.register(pattern, true, Arc::new(callback))
    }

    /// Remove a listener. Returns `false` if it was already gone (for
    /// example a `once` listener that has fired).
    pub fn off(&self, id: ListenerId) -> bool {
        self.write().remove(id)
    }

    /// Publish `payload` on `channel`, returning how many listeners ran.
    pub fn emit(&self, channel: &str, payload: &Value) -> usize {
        let segments: Vec<&str> = channel.split('.').collect();

        let listeners = {
            let mut registry = self.write();
            let listeners = registry.trie.matches(&segments);
            for listener in listeners.iter().filter(|l| l.once) {
                registry.remove(listener.id);
            }
            listeners
        };

        for listener in &listeners {
            (listener.callback)(channel, payload);
        }

        listeners.len()
    }

    /// How many listeners an emission on `channel` would reach right now.
    pub fn listener_count(&self, channel: &str) -> usize {
        let segments: Vec<&str> = channel.split('.').collect();
        self.read().trie.matches(&segments).len()
    }

    /// Number of registered listeners across all patterns.
    pub fn len(&self) -> usize {
        self.read().patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener. Open [`Subscription`]s end.
    pub fn clear(&self) {
        let mut registry = self.write();
        registry.trie.clear();
        registry.patterns.clear();
    }

    /// Subscribe to `pattern` as an ordered stream of [`Event`]s.
    pub fn subscribe(self: &Arc<Self>, pattern: &str) -> Subscription {
        Subscription::new(Arc::clone(self), pattern)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn register(&self, pattern: &str, once: bool, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let segments: Vec<String> = pattern.split('.').map(String::from).collect();

        let mut registry = self.write();
        registry
            .trie
            .insert(&segments, Listener { id, once, callback });
        registry.patterns.insert(id, segments);

        id
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
