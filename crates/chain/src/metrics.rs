//! Link settlement counters, kept per session and summed across sessions.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainCounter {
    Dispatched,
    Resolved,
    Recovered,
    Deferred,
    Rejected,
    ShortCircuited,
}

impl ChainCounter {
    fn slot(self) -> usize {
        self as usize
    }
}

/// Counters owned by one session.
#[derive(Debug, Default)]
pub struct ChainMetrics {
    counts: [AtomicU64; 6],
}

static TOTALS: Lazy<ChainMetrics> = Lazy::new(ChainMetrics::default);

impl ChainMetrics {
    pub(crate) fn record(&self, counter: ChainCounter) {
        self.bump(counter);
        TOTALS.bump(counter);
    }

    fn bump(&self, counter: ChainCounter) {
        self.counts[counter.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: ChainCounter) -> u64 {
        self.counts[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.get(ChainCounter::Dispatched),
            resolved: self.get(ChainCounter::Resolved),
            recovered: self.get(ChainCounter::Recovered),
            deferred: self.get(ChainCounter::Deferred),
            rejected: self.get(ChainCounter::Rejected),
            short_circuited: self.get(ChainCounter::ShortCircuited),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub resolved: u64,
    pub recovered: u64,
    pub deferred: u64,
    pub rejected: u64,
    pub short_circuited: u64,
}

/// Sum over every session in the process.
pub fn process_totals() -> MetricsSnapshot {
    TOTALS.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChainCounter; 6] = [
        ChainCounter::Dispatched,
        ChainCounter::Resolved,
        ChainCounter::Recovered,
        ChainCounter::Deferred,
        ChainCounter::Rejected,
        ChainCounter::ShortCircuited,
    ];

    #[test]
    fn session_counters_feed_process_totals() {
        let metrics = ChainMetrics::default();
        let before = process_totals();
        metrics.record(ChainCounter::Dispatched);
        metrics.record(ChainCounter::Dispatched);
        metrics.record(ChainCounter::ShortCircuited);

        let own = metrics.snapshot();
        assert_eq!(own.dispatched, 2);
        assert_eq!(own.short_circuited, 1);
        assert_eq!(own.rejected, 0);

        let after = process_totals();
        assert!(after.dispatched >= before.dispatched + 2);
        assert!(after.short_circuited > before.short_circuited);
    }

    #[test]
    fn every_counter_has_its_own_slot() {
        let metrics = ChainMetrics::default();
        for counter in ALL {
            metrics.record(counter);
        }
        for counter in ALL {
            assert_eq!(metrics.get(counter), 1);
        }
    }
}
