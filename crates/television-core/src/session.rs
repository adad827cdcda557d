// ── Session ──
//
// One self-healing connection, the bus its frames are routed onto, and
// everything built on top: calls, subscriptions, and collection bindings.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use television_api::{Connection, ConnectionHandle, ConnectionState};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::binding::{BindOptions, Binding, Feed, Step, list_channel};
use crate::bus::{EventBus, ListenerId, Subscription};
use crate::call::{Correlator, Outbox, PendingCalls, Settlement, Tap, into_args};
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::router::router_task;
use crate::store::BindingTarget;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Clones share the same
/// connection, bus, and pending calls.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    connection: ConnectionHandle,
    bus: Arc<EventBus>,
    correlator: Arc<Correlator>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Start a session: spawns the connection loop and the inbound router.
    ///
    /// Returns immediately; the connection opens in the background and
    /// calls made before it is ready are deferred. Must be called from
    /// within a Tokio runtime.
    pub fn connect(config: SessionConfig) -> Result<Self, CoreError> {
        let connection_config = config.connection_config()?;
        let cancel = CancellationToken::new();
        let bus = Arc::new(EventBus::new());

        let Connection {
            handle,
            inbound,
            task: connection_task,
        } = Connection::spawn(connection_config, cancel.clone());

        let router = tokio::spawn(router_task(Arc::clone(&bus), inbound, cancel.clone()));

        let correlator = Arc::new(Correlator::new(
            Arc::new(handle.clone()) as Arc<dyn Outbox>,
            Arc::clone(&bus),
            config.call_retry_interval,
            config.call_timeout,
            cancel.clone(),
        ));

        info!(origin = %config.origin, path = %config.path, "session started");

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                connection: handle,
                bus,
                correlator,
                cancel,
                task_handles: Mutex::new(vec![connection_task, router]),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── Connection ───────────────────────────────────────────────────

    /// Drop the current connection and open a fresh one. Readiness is
    /// false until the new connection is open.
    pub fn initialize(&self) {
        debug!("reinitializing connection");
        self.inner.connection.initialize();
    }

    /// `true` only while the connection is open.
    pub fn is_ready(&self) -> bool {
        self.inner.connection.is_ready()
    }

    /// Observe connection state transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe_state()
    }

    /// Calls currently awaiting a reply.
    pub fn pending(&self) -> &PendingCalls {
        self.inner.correlator.pending()
    }

    // ── Event bus ────────────────────────────────────────────────────

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.inner.bus.on(pattern, callback)
    }

    pub fn once<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.inner.bus.once(pattern, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.bus.off(id)
    }

    /// Publish locally. Nothing is sent to the server.
    pub fn emit(&self, channel: &str, payload: &Value) -> usize {
        self.inner.bus.emit(channel, payload)
    }

    /// Subscribe to `pattern` as an ordered stream of events.
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        self.inner.bus.subscribe(pattern)
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Call `channel` on the server and wait for the reply.
    ///
    /// `args` becomes the positional argument list: pass a tuple or a
    /// `Vec` for several arguments, `()` for none.
    pub async fn call<A: Serialize>(&self, channel: &str, args: A) -> Result<Value, CoreError> {
        let args = into_args(args)?;
        self.inner.correlator.call(channel, args).await
    }

    /// Like [`Session::call`], decoding the reply into `T`.
    pub async fn call_as<T, A>(&self, channel: &str, args: A) -> Result<T, CoreError>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let reply = self.call(channel, args).await?;
        serde_json::from_value(reply).map_err(|e| CoreError::Decode {
            channel: channel.to_owned(),
            message: e.to_string(),
        })
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Keep `target` in step with the mutation events on `channel`.
    ///
    /// With `fetch_initial` set, the whole collection is replaced by the
    /// reply to `<channel>.list`. The reply and the mutation events are
    /// applied in the order they arrived: an event routed before the reply
    /// is overwritten by it, one routed after it applies on top.
    pub fn bind<T: BindingTarget>(&self, target: T, channel: &str, options: BindOptions) -> Binding {
        let (feed, seeds) = Feed::subscribe(&self.inner.bus, channel);
        let fetch = options.fetch_initial.then(|| {
            let correlator = Arc::clone(&self.inner.correlator);
            let list = list_channel(channel);
            let tap: Tap = Arc::new(move |settlement: &Settlement| {
                let _ = seeds.send(Step::Seed(settlement.clone()));
            });
            async move {
                // Server answers are queued through the tap; only local
                // failures are left to report.
                match correlator.call_tapped(&list, Vec::new(), Some(tap)).await {
                    Err(e) if !e.is_rejection() => Err(e),
                    _ => Ok(()),
                }
            }
        });

        Binding::spawn(
            target,
            channel,
            feed,
            fetch,
            options.key_field,
            self.inner.cancel.child_token(),
        )
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop everything: pending calls fail with [`CoreError::Shutdown`],
    /// bindings end, and every listener is dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.bus.clear();
        info!("session shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}
