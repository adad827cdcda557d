// ── Binding targets ──
//
// A binding never owns the collection it keeps in sync. It reads the
// current value, computes the next one, and hands it back through a
// `BindingTarget`.

mod collection;

use std::fmt;

use serde_json::Value;

pub use collection::{BoundCollection, CollectionWatch};

/// An externally owned, ordered collection a binding writes into.
///
/// Implementations must tolerate `replace` being called from a binding
/// task; the binding is the only writer while it runs.
pub trait BindingTarget: Send + Sync + 'static {
    /// The collection as it is now.
    fn current(&self) -> Vec<Value>;

    /// Commit a new value for the whole collection.
    fn replace(&self, items: Vec<Value>);
}

/// Adapts a getter/setter pair into a [`BindingTarget`].
pub struct FnTarget<G, S> {
    get: G,
    set: S,
}

impl<G, S> FnTarget<G, S>
where
    G: Fn() -> Vec<Value> + Send + Sync + 'static,
    S: Fn(Vec<Value>) + Send + Sync + 'static,
{
    pub fn new(get: G, set: S) -> Self {
        Self { get, set }
    }
}

impl<G, S> BindingTarget for FnTarget<G, S>
where
    G: Fn() -> Vec<Value> + Send + Sync + 'static,
    S: Fn(Vec<Value>) + Send + Sync + 'static,
{
    fn current(&self) -> Vec<Value> {
        (self.get)()
    }

    fn replace(&self, items: Vec<Value>) {
        (self.set)(items);
    }
}

impl<G, S> fmt::Debug for FnTarget<G, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTarget").finish_non_exhaustive()
    }
}
