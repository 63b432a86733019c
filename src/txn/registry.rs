use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Timestamp;

const NO_SNAPSHOT: u64 = u64::MAX;

/// Tracks the start timestamps of in-flight attempts so that version
/// pruning never drops a version a live snapshot still needs.
#[derive(Debug)]
pub struct SnapshotRegistry {
    active: Mutex<Vec<Timestamp>>,
    // Cached oldest active start timestamp; NO_SNAPSHOT when idle.
    oldest: AtomicU64,
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self {
            active: Mutex::new(Vec::new()),
            oldest: AtomicU64::new(NO_SNAPSHOT),
        }
    }
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, start_ts: Timestamp) {
        let mut active = self.active.lock();
        active.push(start_ts);
        if start_ts < self.oldest.load(Ordering::Acquire) {
            self.oldest.store(start_ts, Ordering::Release);
        }
    }

    pub fn unregister(&self, start_ts: Timestamp) {
        let mut active = self.active.lock();
        if let Some(pos) = active.iter().position(|&ts| ts == start_ts) {
            active.swap_remove(pos);
        }
        let oldest = active.iter().copied().min().unwrap_or(NO_SNAPSHOT);
        self.oldest.store(oldest, Ordering::Release);
    }

    /// Oldest start timestamp among in-flight attempts, if any.
    pub fn oldest_active(&self) -> Option<Timestamp> {
        match self.oldest.load(Ordering::Acquire) {
            NO_SNAPSHOT => None,
            ts => Some(ts),
        }
    }
}
