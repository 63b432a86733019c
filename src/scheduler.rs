//! Admission queue and quiescence tracking for the worker pool.
//!
//! The queue is a binary heap ordered by `(priority desc, admission seq
//! asc)`: higher priority dequeues first, ties drain in submission order.
//! Workers block on the queue's condition variable; shutdown wins over
//! pending work.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};

use crate::core::errors::StmError;
use crate::txn::Transaction;

/// Unit of work held by the scheduler: the transaction logic plus its
/// admission metadata.
pub(crate) struct ScheduledTxn {
    pub logic: TxnLogic,
    pub priority: i32,
    pub description: String,
    seq: u64,
}

pub(crate) type TxnLogic =
    Box<dyn FnMut(&mut Transaction<'_>) -> Result<(), StmError> + Send + 'static>;

impl PartialEq for ScheduledTxn {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for ScheduledTxn {}

impl PartialOrd for ScheduledTxn {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTxn {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then earlier admission.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<ScheduledTxn>,
    next_seq: u64,
    shutdown: bool,
}

pub(crate) struct TxnQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TxnQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a transaction. Fails once shutdown has been signalled.
    pub fn push(
        &self,
        logic: TxnLogic,
        priority: i32,
        description: String,
    ) -> Result<(), StmError> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(StmError::EngineShutdown);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(ScheduledTxn {
            logic,
            priority,
            description,
            seq,
        });
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until an entry is available or shutdown is signalled. Returns
    /// `None` on shutdown even if the queue still holds entries.
    pub fn pop(&self) -> Option<ScheduledTxn> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(txn) = state.heap.pop() {
                return Some(txn);
            }
            self.available.wait(&mut state);
        }
    }

    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }
}

/// Counts transactions from admission to terminal outcome and lets callers
/// wait for quiescence.
pub(crate) struct IdleTracker {
    active: Mutex<usize>,
    idle: Condvar,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub fn increment(&self) {
        *self.active.lock() += 1;
    }

    pub fn decrement(&self) {
        let mut active = self.active.lock();
        debug_assert!(*active > 0);
        *active -= 1;
        if *active == 0 {
            self.idle.notify_all();
        }
    }

    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    /// Block until no transaction is pending or mid-attempt.
    pub fn wait_for_idle(&self) {
        let mut active = self.active.lock();
        while *active != 0 {
            self.idle.wait(&mut active);
        }
    }
}
