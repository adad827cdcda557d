// ── Ordered stream subscriptions ──
//
// Bridges the callback-style bus into async code: every matching event is
// pushed into an unbounded channel, so nothing is lost and arrival order
// is preserved.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{EventBus, ListenerId};

/// One delivered event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Concrete channel the event was published on.
    pub channel: String,
    pub payload: Value,
}

/// A persistent subscription to a channel pattern.
///
/// The listener is removed from the bus when the subscription is dropped.
pub struct Subscription {
    bus: Arc<EventBus>,
    id: ListenerId,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    pub(crate) fn new(bus: Arc<EventBus>, pattern: &str) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = bus.on(pattern, move |channel, payload| {
            // The receiver may already be gone mid-drop; nothing to do then.
            let _ = tx.send(Event {
                channel: channel.to_owned(),
                payload: payload.clone(),
            });
        });

        Self { bus, id, receiver }
    }

    /// The listener backing this subscription.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the bus has been
    /// cleared and every buffered event has been consumed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.off(self.id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("staff.*");

        bus.emit("staff.log", &json!(1));
        bus.emit("staff.alert", &json!(2));
        bus.emit("chat", &json!(3));

        assert_eq!(
            sub.recv().await.unwrap(),
            Event {
                channel: "staff.log".into(),
                payload: json!(1),
            }
        );
        assert_eq!(sub.recv().await.unwrap().channel, "staff.alert");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn drop_unregisters() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe("widget");
        assert_eq!(bus.listener_count("widget"), 1);

        drop(sub);
        assert_eq!(bus.listener_count("widget"), 0);
    }

    #[tokio::test]
    async fn clear_ends_the_stream() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe("widget");

        bus.emit("widget", &json!("last"));
        bus.clear();

        assert_eq!(sub.recv().await.unwrap().payload, json!("last"));
        assert!(sub.recv().await.is_none());
    }
}
