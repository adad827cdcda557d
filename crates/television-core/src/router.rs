// ── Inbound message router ──
//
// Publishes each decoded frame on the event bus under the channel its
// shape selects. Frames are handled strictly in arrival order; nothing
// here can fail the session.

use std::sync::Arc;

use television_api::Inbound;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::EventBus;

/// Route one inbound frame. Returns the number of listeners reached.
pub fn route(bus: &EventBus, inbound: &Inbound) -> usize {
    match inbound {
        Inbound::Reply { reply_to, payload } => bus.emit(reply_to, payload),
        Inbound::ModelUpdate { model, payload } => {
            debug!(channel = %model, "emitting model update");
            bus.emit(model, payload)
        }
        Inbound::Stream { stream, payload } => {
            debug!(channel = %stream, "emitting on stream");
            bus.emit(stream, payload)
        }
        Inbound::Unrecognized(value) => {
            debug!(frame = %value, "ignoring unhandled WebSocket message");
            0
        }
    }
}

/// Drain the connection's inbound queue into the bus until cancelled.
pub(crate) async fn router_task(
    bus: Arc<EventBus>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = inbound.recv() => {
                let Some(frame) = frame else { break };
                route(&bus, &frame);
            }
        }
    }
    debug!("router exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};
    use television_api::DEFAULT_UPDATE_STREAM;

    use super::*;

    fn frame(value: &Value) -> Inbound {
        Inbound::decode(&value.to_string(), DEFAULT_UPDATE_STREAM).unwrap()
    }

    #[test]
    fn reply_goes_to_reply_channel() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.once("promise-4", move |_, payload| {
            *sink.lock().unwrap() = Some(payload.clone());
        });

        let reached = route(&bus, &frame(&json!({ "replyTo": "promise-4", "payload": [1] })));

        assert_eq!(reached, 1);
        assert_eq!(*seen.lock().unwrap(), Some(json!([1])));
    }

    #[test]
    fn model_update_goes_to_model_channel_with_full_payload() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("widget");
        let payload = json!({ "model": "widget", "action": "delete", "pk": 1 });

        route(&bus, &frame(&json!({ "stream": DEFAULT_UPDATE_STREAM, "payload": payload })));

        assert_eq!(sub.try_recv().unwrap().payload, payload);
    }

    #[test]
    fn stream_goes_to_stream_channel() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("staff.*");

        route(&bus, &frame(&json!({ "stream": "staff.log", "payload": { "message": "hi" } })));

        let event = sub.try_recv().unwrap();
        assert_eq!(event.channel, "staff.log");
        assert_eq!(event.payload["message"], "hi");
    }

    #[test]
    fn unrecognized_frame_emits_nothing() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("**");

        assert_eq!(route(&bus, &frame(&json!({ "foo": "bar" }))), 0);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn router_task_preserves_arrival_order() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("tick");
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        for n in 0..5 {
            tx.send(frame(&json!({ "stream": "tick", "payload": n }))).unwrap();
        }
        drop(tx);

        router_task(Arc::clone(&bus), rx, cancel).await;

        for n in 0..5 {
            assert_eq!(sub.recv().await.unwrap().payload, json!(n));
        }
    }
}
