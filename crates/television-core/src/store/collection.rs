// ── Reactive bound collection ──
//
// An ordered `Vec<Value>` published through a `watch` channel. Writers
// swap in a whole new snapshot; readers get cheap `Arc` clones and can
// await changes.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use super::BindingTarget;

type Snapshot = Arc<Vec<Value>>;

/// A ready-made [`BindingTarget`] that anyone can observe.
///
/// Clones share the same underlying collection.
#[derive(Clone)]
pub struct BoundCollection {
    snapshot: Arc<watch::Sender<Snapshot>>,
}

impl BoundCollection {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    pub fn with_items(items: Vec<Value>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(items));
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// The current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }

    /// Observe future changes.
    pub fn subscribe(&self) -> CollectionWatch {
        CollectionWatch::new(self.snapshot.subscribe())
    }
}

impl Default for BoundCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTarget for BoundCollection {
    fn current(&self) -> Vec<Value> {
        self.snapshot.borrow().as_ref().clone()
    }

    fn replace(&self, items: Vec<Value>) {
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(Arc::new(items));
    }
}

/// A subscription to a [`BoundCollection`].
pub struct CollectionWatch {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl CollectionWatch {
    fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot seen most recently through this watch.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once every handle to the collection is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }
}
