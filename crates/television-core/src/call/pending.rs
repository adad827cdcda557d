// ── In-flight call registry ──
//
// Call id -> issue time, for as long as a call is awaiting its reply.
// Only the correlator writes; everyone else reads (typically to drive a
// busy indicator off the `watch` count).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

/// Read-only view of the calls currently in flight.
pub struct PendingCalls {
    calls: DashMap<u64, DateTime<Utc>>,
    count: watch::Sender<usize>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            calls: DashMap::new(),
            count,
        }
    }

    pub(crate) fn insert(&self, id: u64, issued_at: DateTime<Utc>) {
        self.calls.insert(id, issued_at);
        self.publish();
    }

    /// Remove a call, returning when it was issued.
    pub(crate) fn remove(&self, id: u64) -> Option<DateTime<Utc>> {
        let removed = self.calls.remove(&id).map(|(_, issued_at)| issued_at);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.calls.contains_key(&id)
    }

    /// When call `id` was issued, if it is still pending.
    pub fn issued_at(&self, id: u64) -> Option<DateTime<Utc>> {
        self.calls.get(&id).map(|r| *r.value())
    }

    /// All pending calls, oldest first.
    pub fn snapshot(&self) -> Vec<(u64, DateTime<Utc>)> {
        let mut calls: Vec<_> = self.calls.iter().map(|r| (*r.key(), *r.value())).collect();
        calls.sort_by_key(|&(id, issued_at)| (issued_at, id));
        calls
    }

    /// Observe the number of pending calls.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    fn publish(&self) {
        // `send_replace` updates unconditionally, even with zero receivers.
        self.count.send_replace(self.calls.len());
    }
}
