//! Engine facade: construction and configuration, transaction admission,
//! the worker retry loop, out-of-band inspection, and teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::errors::StmError;
use crate::core::events::{EventSink, TxnEvent};
use crate::core::stats::{EngineStats, StatsSnapshot};
use crate::scheduler::{IdleTracker, ScheduledTxn, TxnQueue};
use crate::store::{CommitResult, PruneStats, VersionedStore};
use crate::txn::{CommitMode, Key, SnapshotRegistry, Transaction, Value};

/// Configuration for constructing an engine.
///
/// # Example
/// ```
/// use mvstm::EngineConfig;
///
/// let config = EngineConfig::new()
///     .workers(4)
///     .fast_path(true)
///     .fast_path_success_rate(0.9);
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Number of worker threads (default: available parallelism, min 1).
    pub workers: usize,
    /// Commit attempts per transaction before giving up (default: 10).
    pub max_attempts: u32,
    /// Sleep between failed attempts (default: 1 ms).
    pub retry_backoff: Duration,
    /// Whether first attempts use the speculative fast path (default: off).
    pub fast_path: bool,
    /// Simulated fast-path success probability (default: 0.9).
    pub fast_path_success_rate: f64,
    /// Observer for terminal transaction outcomes (default: none).
    pub event_sink: Option<EventSink>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: 10,
            retry_backoff: Duration::from_millis(1),
            fast_path: false,
            fast_path_success_rate: 0.9,
            event_sink: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads; clamped to at least 1.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Commit attempts per transaction before it is reported as failed.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sleep between failed commit attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Enable or disable the speculative fast path for first attempts.
    pub fn fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    /// Simulated fast-path success probability; clamped into `[0, 1]`.
    pub fn fast_path_success_rate(mut self, rate: f64) -> Self {
        self.fast_path_success_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Observer invoked with every terminal transaction outcome.
    pub fn event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

struct EngineShared {
    store: VersionedStore,
    queue: TxnQueue,
    tracker: IdleTracker,
    registry: SnapshotRegistry,
    stats: EngineStats,
    use_fast_path: AtomicBool,
    fast_path_success_rate: f64,
    max_attempts: u32,
    retry_backoff: Duration,
    sink: Option<EventSink>,
}

impl EngineShared {
    fn emit(&self, event: TxnEvent) {
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }
}

/// Software transactional memory engine with MVCC snapshots and a
/// priority-scheduled worker pool.
///
/// Submitted closures run on worker threads against a fresh
/// [`Transaction`] per attempt; commits validate optimistically and failed
/// attempts are retried with backoff up to the configured cap.
pub struct StmEngine {
    shared: Arc<EngineShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl StmEngine {
    /// Engine with `num_workers` worker threads and default settings.
    pub fn new(num_workers: usize) -> Self {
        Self::with_config(EngineConfig::new().workers(num_workers))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let shared = Arc::new(EngineShared {
            store: VersionedStore::new(),
            queue: TxnQueue::new(),
            tracker: IdleTracker::new(),
            registry: SnapshotRegistry::new(),
            stats: EngineStats::default(),
            use_fast_path: AtomicBool::new(config.fast_path),
            fast_path_success_rate: config.fast_path_success_rate.clamp(0.0, 1.0),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
            sink: config.event_sink,
        });

        let workers = (0..config.workers.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || run_worker(&shared))
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Install the initial version of `key`. Fails if the key exists.
    pub fn create_key(&self, key: Key, value: Value) -> Result<(), StmError> {
        self.shared.store.create_key(key, value)
    }

    /// Admit a transaction. The closure may run several times (once per
    /// commit attempt) and must confine its effects to the passed context;
    /// an `Err` return rejects the transaction without retry.
    pub fn submit<F>(
        &self,
        priority: i32,
        description: impl Into<String>,
        logic: F,
    ) -> Result<(), StmError>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<(), StmError> + Send + 'static,
    {
        // Admission is counted before the enqueue; a worker may pop and
        // finish the entry before push returns.
        self.shared.tracker.increment();
        match self
            .shared
            .queue
            .push(Box::new(logic), priority, description.into())
        {
            Ok(()) => {
                self.shared.stats.record_submitted();
                Ok(())
            }
            Err(err) => {
                self.shared.tracker.decrement();
                Err(err)
            }
        }
    }

    /// Block until no transaction is pending and no worker is mid-attempt.
    pub fn wait_for_idle(&self) {
        self.shared.tracker.wait_for_idle();
    }

    /// Most recently committed value of `key`, outside any transaction.
    pub fn read_latest(&self, key: Key) -> Result<Value, StmError> {
        self.shared.store.read_latest(key)
    }

    /// Toggle the speculative fast path for first attempts.
    pub fn set_fast_path(&self, enabled: bool) {
        self.shared.use_fast_path.store(enabled, Ordering::Release);
    }

    pub fn fast_path_enabled(&self) -> bool {
        self.shared.use_fast_path.load(Ordering::Acquire)
    }

    /// Transactions admitted but not yet terminally resolved.
    pub fn active_transactions(&self) -> usize {
        self.shared.tracker.active()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Drop versions no live snapshot can still observe. The horizon is the
    /// oldest in-flight start timestamp, or the current clock when idle.
    pub fn prune_versions(&self) -> PruneStats {
        let horizon = self
            .shared
            .registry
            .oldest_active()
            .unwrap_or_else(|| self.shared.store.now());
        self.shared.store.prune_versions(horizon)
    }

    /// Cooperative teardown: workers exit at their next wait point; pending
    /// queue entries are abandoned. Idempotent, also invoked by `Drop`.
    pub fn shutdown(&self) {
        self.shared.queue.shutdown();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for StmEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &EngineShared) {
    while let Some(mut job) = shared.queue.pop() {
        run_transaction(shared, &mut job);
        shared.tracker.decrement();
    }
}

/// The per-transaction retry loop: fresh context per attempt, user errors
/// terminal, conflicts and speculative aborts retried with backoff.
fn run_transaction(shared: &EngineShared, job: &mut ScheduledTxn) {
    for attempt in 0..shared.max_attempts {
        let fast = attempt == 0 && shared.use_fast_path.load(Ordering::Acquire);
        let mode = if fast {
            CommitMode::Fast {
                success_rate: shared.fast_path_success_rate,
            }
        } else {
            CommitMode::Slow
        };

        let mut txn = shared.store.begin(mode);
        let start_ts = txn.start_ts();
        shared.registry.register(start_ts);
        shared.stats.record_attempt();

        let logic_result = (job.logic)(&mut txn);
        let outcome = match logic_result {
            Ok(()) => txn.commit(),
            Err(error) => {
                // The closure rejected its preconditions; retrying would
                // re-run the same rejection. Writes are discarded with the
                // context.
                shared.registry.unregister(start_ts);
                shared.stats.record_user_aborted();
                shared.emit(TxnEvent::UserAborted {
                    description: job.description.clone(),
                    error,
                });
                return;
            }
        };
        shared.registry.unregister(start_ts);

        match outcome {
            CommitResult::Committed(end_ts) => {
                shared.stats.record_committed();
                shared.emit(TxnEvent::Committed {
                    description: job.description.clone(),
                    end_ts,
                    attempts: attempt + 1,
                });
                return;
            }
            CommitResult::Conflict => {
                shared.stats.record_conflict();
            }
            CommitResult::SpuriousAbort => {
                shared.stats.record_spurious_abort();
                // One speculative failure demotes the whole engine to the
                // validating path.
                shared.use_fast_path.store(false, Ordering::Release);
            }
        }

        if attempt + 1 < shared.max_attempts {
            thread::sleep(shared.retry_backoff);
        }
    }

    shared.stats.record_retries_exhausted();
    shared.emit(TxnEvent::RetryExhausted {
        description: job.description.clone(),
        attempts: shared.max_attempts,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_key_then_read_latest() {
        let engine = StmEngine::new(1);
        engine.create_key(100, 5.0).unwrap();
        assert_eq!(engine.read_latest(100).unwrap(), 5.0);
        assert_eq!(engine.create_key(100, 9.0), Err(StmError::KeyExists(100)));
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let engine = StmEngine::new(1);
        engine.shutdown();
        let result = engine.submit(0, "late", |_txn| Ok(()));
        assert_eq!(result, Err(StmError::EngineShutdown));
        assert_eq!(engine.active_transactions(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let engine = StmEngine::new(2);
        engine.shutdown();
        engine.shutdown();
    }

    #[test]
    fn config_clamps_degenerate_values() {
        let config = EngineConfig::new()
            .workers(0)
            .max_attempts(0)
            .fast_path_success_rate(7.0);
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.fast_path_success_rate, 1.0);
    }

    #[test]
    fn prune_with_no_activity_keeps_latest_versions() {
        let engine = StmEngine::new(1);
        engine.create_key(1, 0.0).unwrap();
        for _ in 0..3 {
            engine
                .submit(0, "bump", |txn: &mut Transaction<'_>| {
                    let v = txn.read(1)?;
                    txn.write(1, v + 1.0);
                    Ok(())
                })
                .unwrap();
        }
        engine.wait_for_idle();

        let stats = engine.prune_versions();
        assert_eq!(stats.versions_removed, 3);
        assert_eq!(engine.read_latest(1).unwrap(), 3.0);
    }
}
