use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub committed: u64,
    pub user_aborted: u64,
    pub retries_exhausted: u64,
    pub attempts: u64,
    pub conflicts: u64,
    pub spurious_aborts: u64,
}

/// Per-engine outcome counters.
///
/// All counters are relaxed atomics; they are monotonically increasing
/// between resets and never participate in synchronization.
#[derive(Debug, Default)]
pub struct EngineStats {
    submitted: AtomicU64,
    committed: AtomicU64,
    user_aborted: AtomicU64,
    retries_exhausted: AtomicU64,
    attempts: AtomicU64,
    conflicts: AtomicU64,
    spurious_aborts: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_user_aborted(&self) {
        self.user_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_spurious_abort(&self) {
        self.spurious_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            user_aborted: self.user_aborted.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            spurious_aborts: self.spurious_aborts.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.submitted.store(0, Ordering::Relaxed);
        self.committed.store(0, Ordering::Relaxed);
        self.user_aborted.store(0, Ordering::Relaxed);
        self.retries_exhausted.store(0, Ordering::Relaxed);
        self.attempts.store(0, Ordering::Relaxed);
        self.conflicts.store(0, Ordering::Relaxed);
        self.spurious_aborts.store(0, Ordering::Relaxed);
    }
}
