// ── Request/response correlation ──
//
// Turns fire-and-forget frames into awaitable calls. Each call gets a
// fresh id, a `promise-<id>` reply channel and an `error-<id>` error
// channel. One-shot listeners on those channels settle the call; the
// server decides which one fires.

mod id;
mod pending;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use television_api::{ConnectionHandle, Outbound};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{EventBus, ListenerId};
use crate::error::CoreError;

pub use id::{MAX_SAFE_INTEGER, error_channel, next_call_id, reply_channel};
pub use pending::PendingCalls;

pub(crate) use id::CallIds;

// ── Outbox seam ──────────────────────────────────────────────────────

/// Where encoded call frames go.
pub(crate) trait Outbox: Send + Sync {
    fn is_ready(&self) -> bool;
    fn send(&self, frame: String) -> Result<(), television_api::Error>;
}

impl Outbox for ConnectionHandle {
    fn is_ready(&self) -> bool {
        ConnectionHandle::is_ready(self)
    }

    fn send(&self, frame: String) -> Result<(), television_api::Error> {
        ConnectionHandle::send(self, frame)
    }
}

/// Normalize call arguments into the positional `payload` array.
///
/// Sequences (tuples, vecs, arrays) become the argument list as-is, `()`
/// means no arguments, anything else is a single argument.
pub fn into_args<A: Serialize>(args: A) -> Result<Vec<Value>, CoreError> {
    Ok(match serde_json::to_value(args)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}

// ── Correlator ───────────────────────────────────────────────────────

/// A server answer: `Ok` from the reply channel, `Err` from the error channel.
pub(crate) type Settlement = Result<Value, Value>;

/// Observes a call's settlement synchronously, on the task that routed it,
/// before the caller is woken.
pub(crate) type Tap = Arc<dyn Fn(&Settlement) + Send + Sync>;

type SettleSlot = Arc<Mutex<Option<oneshot::Sender<Settlement>>>>;

pub(crate) struct Correlator {
    outbox: Arc<dyn Outbox>,
    bus: Arc<EventBus>,
    pending: Arc<PendingCalls>,
    ids: CallIds,
    retry_interval: Duration,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Correlator {
    pub(crate) fn new(
        outbox: Arc<dyn Outbox>,
        bus: Arc<EventBus>,
        retry_interval: Duration,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbox,
            bus,
            pending: Arc::new(PendingCalls::new()),
            ids: CallIds::default(),
            retry_interval,
            timeout,
            cancel,
        }
    }

    pub(crate) fn pending(&self) -> &Arc<PendingCalls> {
        &self.pending
    }

    /// Issue a call and wait for its reply.
    ///
    /// While the connection is not ready the whole call is retried on a
    /// flat interval, without limit.
    pub(crate) async fn call(&self, channel: &str, args: Vec<Value>) -> Result<Value, CoreError> {
        self.call_tapped(channel, args, None).await
    }

    /// Like [`Correlator::call`], also handing the server's answer to `tap`
    /// at the point it is routed, so it keeps its place among other
    /// inbound frames.
    pub(crate) async fn call_tapped(
        &self,
        channel: &str,
        args: Vec<Value>,
        tap: Option<Tap>,
    ) -> Result<Value, CoreError> {
        loop {
            self.wait_until_ready(channel).await?;
            if let Some(in_flight) = self.issue(channel, &args, tap.as_ref())? {
                return self.settle(channel, in_flight).await;
            }
        }
    }

    async fn wait_until_ready(&self, channel: &str) -> Result<(), CoreError> {
        while !self.outbox.is_ready() {
            debug!(channel, "socket not ready; deferring call");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(CoreError::Shutdown),
                () = tokio::time::sleep(self.retry_interval) => {}
            }
        }
        if self.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }
        Ok(())
    }

    /// Register and send one call. `Ok(None)` means readiness was lost
    /// before the frame could be queued; nothing was sent.
    fn issue(
        &self,
        channel: &str,
        args: &[Value],
        tap: Option<&Tap>,
    ) -> Result<Option<InFlight>, CoreError> {
        let id = self.ids.allocate();
        let envelope = Outbound {
            channel: channel.to_owned(),
            reply_to: reply_channel(id),
            error_to: error_channel(id),
            payload: args.to_vec(),
        };
        let frame = envelope.to_frame()?;

        self.pending.insert(id, Utc::now());

        let (tx, rx) = oneshot::channel();
        let slot: SettleSlot = Arc::new(Mutex::new(Some(tx)));

        let reply_listener = {
            let slot = Arc::clone(&slot);
            let tap = tap.cloned();
            let pending = Arc::clone(&self.pending);
            let channel = channel.to_owned();
            self.bus.once(&envelope.reply_to, move |_, payload| {
                if let Some(issued_at) = pending.remove(id) {
                    let elapsed = Utc::now() - issued_at;
                    debug!(%channel, elapsed_ms = elapsed.num_milliseconds(), "call replied");
                }
                settle_slot(&slot, tap.as_ref(), Ok(payload.clone()));
            })
        };

        let error_listener = {
            let tap = tap.cloned();
            let pending = Arc::clone(&self.pending);
            self.bus.once(&envelope.error_to, move |_, payload| {
                pending.remove(id);
                settle_slot(&slot, tap.as_ref(), Err(payload.clone()));
            })
        };

        let guard = CallGuard {
            id,
            bus: Arc::clone(&self.bus),
            pending: Arc::clone(&self.pending),
            listeners: [reply_listener, error_listener],
        };

        debug!(channel, id, args = args.len(), "emitting call");
        match self.outbox.send(frame) {
            Ok(()) => Ok(Some(InFlight { rx, _guard: guard })),
            Err(television_api::Error::NotReady) => {
                debug!(channel, id, "connection dropped before send; deferring call");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn settle(&self, channel: &str, in_flight: InFlight) -> Result<Value, CoreError> {
        let InFlight { rx, _guard } = in_flight;

        let wait = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                    warn!(channel, "call timed out");
                    CoreError::CallTimeout {
                        channel: channel.to_owned(),
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }
                }),
                None => Ok(rx.await),
            }
        };

        let received = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(CoreError::Shutdown),
            received = wait => received?,
        };

        match received {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(payload)) => Err(CoreError::CallRejected {
                channel: channel.to_owned(),
                payload,
            }),
            // Listeners were dropped without firing (bus cleared on shutdown).
            Err(_) => Err(CoreError::Shutdown),
        }
    }
}

fn settle_slot(slot: &SettleSlot, tap: Option<&Tap>, settlement: Settlement) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        if let Some(tap) = tap {
            tap(&settlement);
        }
        // The caller may have given up; that is fine.
        let _ = sender.send(settlement);
    }
}

/// A sent call awaiting settlement.
struct InFlight {
    rx: oneshot::Receiver<Settlement>,
    _guard: CallGuard,
}

/// Removes a call's pending entry and both of its listeners, however the
/// call ends (reply, error, timeout, shutdown, or the future being dropped).
struct CallGuard {
    id: u64,
    bus: Arc<EventBus>,
    pending: Arc<PendingCalls>,
    listeners: [ListenerId; 2],
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.pending.remove(self.id);
        for listener in self.listeners {
            self.bus.off(listener);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct FakeOutbox {
        ready: AtomicBool,
        sent: Mutex<Vec<Value>>,
    }

    impl FakeOutbox {
        fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Outbox for FakeOutbox {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn send(&self, frame: String) -> Result<(), television_api::Error> {
            if !self.is_ready() {
                return Err(television_api::Error::NotReady);
            }
            self.sent.lock().unwrap().push(serde_json::from_str(&frame).unwrap());
            Ok(())
        }
    }

    fn correlator(ready: bool, timeout: Option<Duration>) -> (Arc<Correlator>, Arc<FakeOutbox>, Arc<EventBus>) {
        let outbox = Arc::new(FakeOutbox::default());
        outbox.ready.store(ready, Ordering::SeqCst);
        let bus = Arc::new(EventBus::new());
        let correlator = Correlator::new(
            Arc::clone(&outbox) as Arc<dyn Outbox>,
            Arc::clone(&bus),
            Duration::from_millis(500),
            timeout,
            CancellationToken::new(),
        );
        (Arc::new(correlator), outbox, bus)
    }

    async fn settle_tasks() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn args_normalization() {
        assert_eq!(into_args(()).unwrap(), Vec::<Value>::new());
        assert_eq!(into_args((1, "two")).unwrap(), vec![json!(1), json!("two")]);
        assert_eq!(into_args(vec![json!(true)]).unwrap(), vec![json!(true)]);
        assert_eq!(into_args(json!({ "a": 1 })).unwrap(), vec![json!({ "a": 1 })]);
    }

    #[test]
    fn unserializable_args_fail_before_send() {
        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");
        assert!(matches!(into_args(bad), Err(CoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn reply_resolves_and_cleans_up() {
        let (correlator, outbox, bus) = correlator(true, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("widget.list", vec![json!(5)]).await }
        });
        settle_tasks().await;

        assert_eq!(
            outbox.sent(),
            vec![json!({
                "channel": "widget.list",
                "replyTo": "promise-1",
                "errorTo": "error-1",
                "payload": [5]
            })]
        );
        assert!(correlator.pending().contains(1));

        bus.emit("promise-1", &json!([{ "pk": 1 }]));
        assert!(correlator.pending().is_empty());

        assert_eq!(task.await.unwrap().unwrap(), json!([{ "pk": 1 }]));
        assert!(bus.is_empty(), "both one-shot listeners should be gone");
    }

    #[tokio::test]
    async fn error_channel_rejects() {
        let (correlator, _outbox, bus) = correlator(true, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("widget.save", Vec::new()).await }
        });
        settle_tasks().await;

        bus.emit("error-1", &json!("Backend Error\nValueError: nope"));
        let err = task.await.unwrap().unwrap_err();

        assert!(matches!(
            err,
            CoreError::CallRejected { ref channel, ref payload }
                if channel == "widget.save" && payload == &json!("Backend Error\nValueError: nope")
        ));
        assert!(correlator.pending().is_empty());
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn settles_at_most_once() {
        let (correlator, _outbox, bus) = correlator(true, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("x", Vec::new()).await }
        });
        settle_tasks().await;

        assert_eq!(bus.emit("promise-1", &json!("first")), 1);
        assert_eq!(bus.emit("promise-1", &json!("second")), 0);
        assert_eq!(task.await.unwrap().unwrap(), json!("first"));
        assert_eq!(bus.emit("error-1", &json!("late")), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_settle_out_of_order() {
        let (correlator, outbox, bus) = correlator(true, None);

        let mut tasks = Vec::new();
        for n in 0..3 {
            let correlator = Arc::clone(&correlator);
            tasks.push(tokio::spawn(async move { correlator.call("echo", vec![json!(n)]).await }));
            settle_tasks().await;
        }
        assert_eq!(outbox.sent().len(), 3);
        assert_eq!(correlator.pending().len(), 3);

        // Reply in reverse, and reject the middle call.
        bus.emit("promise-3", &json!("third"));
        bus.emit("error-2", &json!("second failed"));
        bus.emit("promise-1", &json!("first"));

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }
        assert_eq!(results[0].as_ref().unwrap(), &json!("first"));
        assert!(results[1].as_ref().unwrap_err().is_rejection());
        assert_eq!(results[2].as_ref().unwrap(), &json!("third"));
        assert!(correlator.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_until_ready_then_sent_once() {
        let (correlator, outbox, bus) = correlator(false, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("widget.list", Vec::new()).await }
        });

        for _ in 0..4 {
            tokio::time::advance(Duration::from_millis(500)).await;
            settle_tasks().await;
        }
        assert!(outbox.sent().is_empty());
        assert!(correlator.pending().is_empty());

        outbox.ready.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(500)).await;
        settle_tasks().await;
        assert_eq!(outbox.sent().len(), 1);

        bus.emit("promise-1", &json!("ok"));
        assert_eq!(task.await.unwrap().unwrap(), json!("ok"));
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_gives_up_and_cleans_up() {
        let (correlator, _outbox, bus) = correlator(true, Some(Duration::from_secs(2)));

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("slow", Vec::new()).await }
        });
        settle_tasks().await;
        assert_eq!(correlator.pending().len(), 1);

        tokio::time::advance(Duration::from_secs(3)).await;
        let err = task.await.unwrap().unwrap_err();

        assert!(matches!(err, CoreError::CallTimeout { timeout_ms: 2000, .. }));
        assert!(correlator.pending().is_empty());
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn without_timeout_call_stays_pending() {
        let (correlator, _outbox, _bus) = correlator(true, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("never", Vec::new()).await }
        });
        settle_tasks().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!task.is_finished());
        assert!(correlator.pending().contains(1));

        task.abort();
        let _ = task.await;
        assert!(correlator.pending().is_empty(), "dropping the future releases the call");
    }

    #[tokio::test]
    async fn tap_sees_settlement_during_emit_exactly_once() {
        let (correlator, _outbox, bus) = correlator(true, None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap: Tap = {
            let seen = Arc::clone(&seen);
            Arc::new(move |settlement: &Settlement| seen.lock().unwrap().push(settlement.clone()))
        };

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call_tapped("widget.list", Vec::new(), Some(tap)).await }
        });
        settle_tasks().await;

        bus.emit("promise-1", &json!([1]));
        // Observed before the caller has had a chance to run.
        assert_eq!(*seen.lock().unwrap(), vec![Ok(json!([1]))]);

        bus.emit("error-1", &json!("late"));
        assert_eq!(task.await.unwrap().unwrap(), json!([1]));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tap_sees_rejections() {
        let (correlator, _outbox, bus) = correlator(true, None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap: Tap = {
            let seen = Arc::clone(&seen);
            Arc::new(move |settlement: &Settlement| seen.lock().unwrap().push(settlement.clone()))
        };

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call_tapped("widget.list", Vec::new(), Some(tap)).await }
        });
        settle_tasks().await;

        bus.emit("error-1", &json!("Backend Error"));
        assert_eq!(*seen.lock().unwrap(), vec![Err(json!("Backend Error"))]);
        assert!(task.await.unwrap().unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn shutdown_fails_waiting_calls() {
        let (correlator, _outbox, _bus) = correlator(false, None);

        let task = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call("x", Vec::new()).await }
        });
        settle_tasks().await;

        correlator.cancel.cancel();
        assert!(matches!(task.await.unwrap(), Err(CoreError::Shutdown)));
    }
}
