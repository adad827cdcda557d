// television-core: session layer over the television WebSocket transport.
//
// Routes inbound frames onto a wildcard event bus, correlates calls with
// their replies, and reconciles model-update events into bound
// collections.

pub mod binding;
pub mod bus;
pub mod call;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod router;
pub mod session;
pub mod store;

pub use binding::{BindOptions, Binding};
pub use bus::{Event, EventBus, ListenerId, Subscription};
pub use call::{PendingCalls, into_args};
pub use config::SessionConfig;
pub use error::CoreError;
pub use reconcile::{DEFAULT_KEY_FIELD, MutationAction, Outcome, apply_mutation};
pub use session::Session;
pub use store::{BindingTarget, BoundCollection, CollectionWatch, FnTarget};

pub use television_api::{ConnectionState, DEFAULT_PATH, DEFAULT_UPDATE_STREAM};
