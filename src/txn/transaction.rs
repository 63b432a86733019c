use std::collections::{BTreeMap, HashMap};

use crate::core::errors::StmError;
use crate::store::{CommitResult, VersionedStore};

use super::{Key, Timestamp, Value};

/// Which commit protocol one attempt uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitMode {
    /// Validating commit: read-set freshness is checked before installing.
    Slow,
    /// Speculative commit: installs without validation and spuriously fails
    /// a configurable fraction of the time.
    Fast { success_rate: f64 },
}

/// What a transaction saw the first time it read a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadObservation {
    pub value: Value,
    pub version_ts: Timestamp,
}

/// Per-attempt transaction context.
///
/// Created fresh for every commit attempt and discarded afterwards; read and
/// write sets are never reused. The context borrows the store for the
/// duration of the attempt and touches it only through snapshot reads;
/// installation happens at commit, inside the store's commit lock.
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a VersionedStore,
    start_ts: Timestamp,
    read_set: HashMap<Key, ReadObservation>,
    write_set: BTreeMap<Key, Value>,
    mode: CommitMode,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a VersionedStore, mode: CommitMode) -> Self {
        Self {
            store,
            start_ts: store.now(),
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            mode,
        }
    }

    /// The global clock value sampled when this attempt began. Fixed for
    /// the lifetime of the attempt.
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Read `key` as of this transaction's snapshot.
    ///
    /// Buffered writes win over the snapshot (read-your-writes). The first
    /// snapshot observation of a key is recorded; repeated reads return the
    /// recorded value without consulting the store again.
    pub fn read(&mut self, key: Key) -> Result<Value, StmError> {
        if let Some(&value) = self.write_set.get(&key) {
            return Ok(value);
        }
        if let Some(observation) = self.read_set.get(&key) {
            return Ok(observation.value);
        }
        let (value, version_ts) = self.store.snapshot_at(key, self.start_ts)?;
        self.read_set.insert(key, ReadObservation { value, version_ts });
        Ok(value)
    }

    /// Buffer a write. The store is untouched until commit.
    pub fn write(&mut self, key: Key, value: Value) {
        self.write_set.insert(key, value);
    }

    /// Try to commit this attempt. Consumes the context; a failed commit
    /// leaves the store unchanged and the caller retries with a fresh one.
    pub fn commit(self) -> CommitResult {
        match self.mode {
            CommitMode::Slow => self.store.commit_slow(&self.read_set, &self.write_set),
            CommitMode::Fast { success_rate } => {
                self.store.commit_fast(&self.write_set, success_rate)
            }
        }
    }
}
