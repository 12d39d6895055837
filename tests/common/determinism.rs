//! Deterministic test data
//!
//! Session timelines and event ids built from fixed values so replay timing
//! and log ordering assertions are reproducible.

use std::sync::atomic::{AtomicU64, Ordering};

use stackdeck::HistoryEntry;

/// Fixed base timestamp for recorded events (2024-01-01 00:00:00 UTC, in ms)
pub const TEST_EPOCH_MS: u64 = 1_704_067_200_000;

/// Generates sequential event ids (`evt-0001`, `evt-0002`, ...)
pub struct DeterministicIds {
    counter: AtomicU64,
}

impl DeterministicIds {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("evt-{n:04}")
    }
}

impl Default for DeterministicIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A command/output session where event `i` happens at `TEST_EPOCH_MS + offsets[i]`.
pub fn session_timeline(offsets: &[u64]) -> Vec<HistoryEntry> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, offset)| {
            let ts = TEST_EPOCH_MS + offset;
            if i % 2 == 0 {
                HistoryEntry::command(format!("cmd-{i}"), ts)
            } else {
                HistoryEntry::output(format!("out-{i}\n"), ts)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let ids = DeterministicIds::new();
        assert_eq!(ids.next(), "evt-0001");
        assert_eq!(ids.next(), "evt-0002");
    }

    #[test]
    fn test_timeline_alternates_command_and_output() {
        let timeline = session_timeline(&[0, 100, 250]);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].data, "cmd-0");
        assert_eq!(timeline[1].timestamp, TEST_EPOCH_MS + 100);
        assert_eq!(timeline[2].data, "cmd-2");
    }
}
