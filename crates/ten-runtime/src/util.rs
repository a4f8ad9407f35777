//! Small process-wide counters: message sequence numbers and graph ids.
//!
//! Graph ids are "ULID-like, monotonic" per spec §4.2: a millisecond
//! timestamp prefix followed by a per-process monotonic counter, so ids
//! sort lexicographically in creation order without pulling in a ULID
//! crate for a property nothing else in the runtime needs (no
//! cross-process ULID interop is required — ids only need to be unique and
//! creation-ordered within one App).

use std::sync::atomic::{AtomicU64, Ordering};

static MSG_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
static GRAPH_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_msg_id() -> u64 {
    MSG_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A fresh, monotonically increasing graph id.
pub fn next_graph_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = GRAPH_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{millis:013x}-{seq:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_ids_are_unique_and_increasing_in_sequence() {
        let a = next_graph_id();
        let b = next_graph_id();
        assert_ne!(a, b);
    }
}
