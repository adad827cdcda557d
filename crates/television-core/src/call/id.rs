// ── Call identifiers ──
//
// Ids grow by one per call and wrap to zero after the largest integer a
// JSON number can carry exactly. Wrap-around reuse is only safe because
// calls are short-lived relative to the id space.

use std::sync::atomic::{AtomicU64, Ordering};

/// 2^53 - 1, the largest integer that survives a round-trip through an
/// IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// The id that follows `current`.
pub const fn next_call_id(current: u64) -> u64 {
    if current >= MAX_SAFE_INTEGER {
        0
    } else {
        current + 1
    }
}

/// Reply channel for call `id`.
pub fn reply_channel(id: u64) -> String {
    format!("promise-{id}")
}

/// Error channel for call `id`.
pub fn error_channel(id: u64) -> String {
    format!("error-{id}")
}

/// Lock-free id allocator. The counter starts at 0, so the first call
/// gets id 1.
#[derive(Debug, Default)]
pub(crate) struct CallIds {
    counter: AtomicU64,
}

impl CallIds {
    #[cfg(test)]
    pub(crate) fn starting_at(counter: u64) -> Self {
        Self {
            counter: AtomicU64::new(counter),
        }
    }

    pub(crate) fn allocate(&self) -> u64 {
        let previous = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |k| Some(next_call_id(k)))
            .unwrap_or_else(|k| k);
        next_call_id(previous)
    }
}
