// ── Collection bindings ──
//
// Keeps a `BindingTarget` in step with a channel of mutation events,
// optionally seeded by one `<channel>.list` call. The list reply and the
// events share one queue, filled as the router publishes them, so they are
// applied strictly in arrival order. An unknown action stops the binding.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{Event, EventBus, ListenerId};
use crate::call::Settlement;
use crate::error::CoreError;
use crate::reconcile::{DEFAULT_KEY_FIELD, apply_mutation};
use crate::store::BindingTarget;

/// How a binding behaves.
#[derive(Debug, Clone)]
pub struct BindOptions {
    /// Unique key field of the bound entities.
    pub key_field: String,
    /// Seed the collection with a `<channel>.list` call.
    pub fetch_initial: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.into(),
            fetch_initial: true,
        }
    }
}

/// The channel an initial full-list fetch is made on.
pub fn list_channel(channel: &str) -> String {
    format!("{channel}.list")
}

// ── Ordered feed ─────────────────────────────────────────────────────

/// One unit of binding work, queued in the order it was routed.
#[derive(Debug)]
pub(crate) enum Step {
    /// The server's answer to the `<channel>.list` call.
    Seed(Settlement),
    /// A mutation event published on the bound channel.
    Event(Event),
}

/// The queue a binding drains. Mutation events are pushed by a bus
/// listener; seeds are pushed through the sender returned alongside.
///
/// The listener is removed when the feed is dropped.
pub(crate) struct Feed {
    bus: Arc<EventBus>,
    listener: ListenerId,
    steps: mpsc::UnboundedReceiver<Step>,
}

impl Feed {
    pub(crate) fn subscribe(bus: &Arc<EventBus>, channel: &str) -> (Self, mpsc::UnboundedSender<Step>) {
        let (seeds, steps) = mpsc::unbounded_channel();
        let events = seeds.clone();
        let listener = bus.on(channel, move |channel, payload| {
            let _ = events.send(Step::Event(Event {
                channel: channel.to_owned(),
                payload: payload.clone(),
            }));
        });

        let feed = Self {
            bus: Arc::clone(bus),
            listener,
            steps,
        };
        (feed, seeds)
    }

    async fn next(&mut self) -> Option<Step> {
        self.steps.recv().await
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.bus.off(self.listener);
    }
}

// ── Binding ──────────────────────────────────────────────────────────

/// A running binding.
///
/// Dropping the handle leaves the binding running until the session shuts
/// down; call [`Binding::unbind`] to stop it early.
pub struct Binding {
    channel: String,
    task: JoinHandle<Result<(), CoreError>>,
    cancel: CancellationToken,
}

impl Binding {
    /// Start a binding over `feed`, which must already be subscribed to
    /// `channel` so nothing published after this call is missed.
    ///
    /// `fetch` drives the initial list call. Its answer arrives through
    /// the feed; only failures that never reached the server are reported
    /// by the future itself.
    pub(crate) fn spawn<T, F>(
        target: T,
        channel: &str,
        feed: Feed,
        fetch: Option<F>,
        key_field: String,
        cancel: CancellationToken,
    ) -> Self
    where
        T: BindingTarget,
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let task = tokio::spawn(run(
            Arc::new(target),
            channel.to_owned(),
            feed,
            fetch,
            key_field,
            cancel.clone(),
        ));
        Self {
            channel: channel.to_owned(),
            task,
            cancel,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the binding to end. Returns the fatal error that stopped
    /// it, if any. Ends cleanly on [`Binding::unbind`] or session shutdown.
    pub async fn join(self) -> Result<(), CoreError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(()),
        }
    }

    /// Stop the binding and wait for it to wind down.
    pub async fn unbind(self) {
        self.cancel.cancel();
        if let Err(e) = self.join().await {
            debug!(error = %e, "binding had already stopped");
        }
    }
}

async fn run<T, F>(
    target: Arc<T>,
    channel: String,
    mut feed: Feed,
    fetch: Option<F>,
    key_field: String,
    cancel: CancellationToken,
) -> Result<(), CoreError>
where
    T: BindingTarget,
    F: Future<Output = Result<(), CoreError>> + Send + 'static,
{
    let mut fetching = fetch.is_some();
    let fetch = async move {
        match fetch {
            Some(fetch) => fetch.await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(fetch);

    info!(%channel, %key_field, fetch_initial = fetching, "binding started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            step = feed.next() => {
                let Some(step) = step else { break };
                apply_step(target.as_ref(), &channel, &key_field, step)?;
            }
            result = &mut fetch, if fetching => {
                fetching = false;
                if let Err(e) = result {
                    warn!(%channel, error = %e, "initial list fetch failed");
                }
            }
        }
    }

    debug!(%channel, "binding exiting");
    Ok(())
}

/// Apply one step as a read-modify-commit.
fn apply_step<T: BindingTarget + ?Sized>(
    target: &T,
    channel: &str,
    key_field: &str,
    step: Step,
) -> Result<(), CoreError> {
    match step {
        Step::Seed(Ok(Value::Array(items))) => {
            debug!(channel, count = items.len(), "seeded binding");
            target.replace(items);
        }
        Step::Seed(Ok(other)) => warn!(channel, reply = %other, "initial list is not an array; ignoring"),
        Step::Seed(Err(payload)) => warn!(channel, error = %payload, "initial list fetch rejected"),
        Step::Event(event) => {
            let mut items = target.current();
            match apply_mutation(&mut items, &event.payload, key_field, channel) {
                Ok(outcome) if outcome.changed() => {
                    debug!(channel, ?outcome, "applied mutation");
                    target.replace(items);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(channel, error = %e, "binding stopped");
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}
