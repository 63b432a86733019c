//! Shared versioned store: per-key version chains, the global commit clock,
//! and the commit protocol (validating slow path and speculative fast path).
//!
//! The chain map is only mutated while the commit lock is held; snapshot
//! reads take the map's read lock and never touch the commit lock, so
//! readers block neither each other nor a committer's validation phase.

mod version;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Serialize;

use crate::core::errors::StmError;
use crate::txn::{CommitMode, Key, ReadObservation, Timestamp, Transaction, Value, TS_INITIAL};

pub use version::{Version, VersionChain};

/// Verdict of a single commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Writes were installed under the returned commit timestamp.
    Committed(Timestamp),
    /// A read-set key gained a newer version after it was observed.
    Conflict,
    /// The speculative fast path rejected the attempt.
    SpuriousAbort,
}

/// Outcome of a pruning pass over the version chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub chains_pruned: usize,
    pub versions_removed: usize,
}

#[derive(Debug, Default)]
pub struct VersionedStore {
    chains: RwLock<HashMap<Key, VersionChain>>,
    /// Serializes committers; validation and installation happen under it.
    commit_lock: Mutex<()>,
    /// Advanced once per successful commit, only under `commit_lock`.
    /// Loaded lock-free when a transaction samples its start timestamp.
    clock: AtomicU64,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the global clock.
    pub fn now(&self) -> Timestamp {
        self.clock.load(Ordering::Acquire)
    }

    /// Begin a standalone transaction attempt against this store.
    pub fn begin(&self, mode: CommitMode) -> Transaction<'_> {
        Transaction::new(self, mode)
    }

    /// Install the initial version `(0, value)` for `key`.
    pub fn create_key(&self, key: Key, value: Value) -> Result<(), StmError> {
        let _commit = self.commit_lock.lock();
        let mut chains = self.chains.write();
        if chains.contains_key(&key) {
            return Err(StmError::KeyExists(key));
        }
        chains.insert(key, VersionChain::with_initial(TS_INITIAL, value));
        Ok(())
    }

    /// The value and commit timestamp of `key` as of `ts`: the version with
    /// the largest commit timestamp not exceeding `ts`.
    pub fn snapshot_at(&self, key: Key, ts: Timestamp) -> Result<(Value, Timestamp), StmError> {
        let chains = self.chains.read();
        let chain = chains.get(&key).ok_or(StmError::MissingKey(key))?;
        match chain.visible_at(ts) {
            Some(version) => Ok((version.value, version.ts)),
            None => Err(StmError::NoVisibleVersion { key, start_ts: ts }),
        }
    }

    /// The smallest commit timestamp of `key` strictly greater than `ts`.
    pub fn latest_version_after(&self, key: Key, ts: Timestamp) -> Option<Timestamp> {
        let chains = self.chains.read();
        chains.get(&key).and_then(|chain| chain.first_after(ts))
    }

    /// The most recently committed value of `key`.
    pub fn read_latest(&self, key: Key) -> Result<Value, StmError> {
        let chains = self.chains.read();
        let chain = chains.get(&key).ok_or(StmError::MissingKey(key))?;
        chain
            .latest()
            .map(|version| version.value)
            .ok_or(StmError::MissingKey(key))
    }

    /// Validating commit: abort if any read-set key gained a version after
    /// the recorded observation, otherwise install the write set under a
    /// fresh commit timestamp.
    pub(crate) fn commit_slow(
        &self,
        read_set: &HashMap<Key, ReadObservation>,
        write_set: &BTreeMap<Key, Value>,
    ) -> CommitResult {
        let _commit = self.commit_lock.lock();
        let end_ts = self.now() + 1;

        {
            let chains = self.chains.read();
            for (key, observation) in read_set {
                let Some(chain) = chains.get(key) else {
                    // Chains are never removed once created, so a recorded
                    // observation implies the chain is still present.
                    return CommitResult::Conflict;
                };
                if let Some(newer) = chain.first_after(observation.version_ts) {
                    if newer < end_ts {
                        return CommitResult::Conflict;
                    }
                }
            }
        }

        self.install_writes(write_set, end_ts);
        CommitResult::Committed(end_ts)
    }

    /// Speculative commit: a Bernoulli trial stands in for hardware commit
    /// success. On success the write set is installed without read
    /// validation; on failure nothing is touched.
    pub(crate) fn commit_fast(
        &self,
        write_set: &BTreeMap<Key, Value>,
        success_rate: f64,
    ) -> CommitResult {
        let _commit = self.commit_lock.lock();
        if !rand::thread_rng().gen_bool(success_rate.clamp(0.0, 1.0)) {
            return CommitResult::SpuriousAbort;
        }
        let end_ts = self.now() + 1;
        self.install_writes(write_set, end_ts);
        CommitResult::Committed(end_ts)
    }

    /// Append the write set under `end_ts` and advance the clock. Chains are
    /// created on the fly for keys first touched by a write.
    fn install_writes(&self, write_set: &BTreeMap<Key, Value>, end_ts: Timestamp) {
        let mut chains = self.chains.write();
        for (&key, &value) in write_set {
            chains.entry(key).or_default().push(end_ts, value);
        }
        self.clock.store(end_ts, Ordering::Release);
    }

    /// Drop versions no snapshot at or after `horizon` can observe.
    pub fn prune_versions(&self, horizon: Timestamp) -> PruneStats {
        let _commit = self.commit_lock.lock();
        let mut chains = self.chains.write();
        let mut stats = PruneStats::default();
        for chain in chains.values_mut() {
            let removed = chain.truncate_obsolete(horizon);
            if removed > 0 {
                stats.chains_pruned += 1;
                stats.versions_removed += removed;
            }
        }
        stats
    }

    /// Number of keys with a version chain.
    pub fn key_count(&self) -> usize {
        self.chains.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(value: Value, version_ts: Timestamp) -> ReadObservation {
        ReadObservation { value, version_ts }
    }

    #[test]
    fn create_then_read_latest_roundtrip() {
        let store = VersionedStore::new();
        store.create_key(100, 5.0).unwrap();
        assert_eq!(store.read_latest(100).unwrap(), 5.0);
        assert_eq!(store.now(), 0);
    }

    #[test]
    fn create_existing_key_fails() {
        let store = VersionedStore::new();
        store.create_key(7, 1.0).unwrap();
        assert_eq!(store.create_key(7, 2.0), Err(StmError::KeyExists(7)));
        assert_eq!(store.read_latest(7).unwrap(), 1.0);
    }

    #[test]
    fn snapshot_at_missing_key() {
        let store = VersionedStore::new();
        assert_eq!(store.snapshot_at(42, 0), Err(StmError::MissingKey(42)));
    }

    #[test]
    fn commit_installs_under_fresh_timestamp() {
        let store = VersionedStore::new();
        store.create_key(1, 10.0).unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(1, 11.0);
        let result = store.commit_slow(&HashMap::new(), &writes);
        assert_eq!(result, CommitResult::Committed(1));
        assert_eq!(store.now(), 1);
        assert_eq!(store.read_latest(1).unwrap(), 11.0);

        // The old version stays visible to old snapshots.
        assert_eq!(store.snapshot_at(1, 0).unwrap(), (10.0, 0));
        assert_eq!(store.snapshot_at(1, 1).unwrap(), (11.0, 1));
    }

    #[test]
    fn commit_detects_interleaved_write() {
        let store = VersionedStore::new();
        store.create_key(1, 0.0).unwrap();

        // A transaction observes version 0 of key 1...
        let mut reads = HashMap::new();
        reads.insert(1, observation(0.0, 0));

        // ...then another commit lands on key 1.
        let mut other_writes = BTreeMap::new();
        other_writes.insert(1, 5.0);
        assert_eq!(
            store.commit_slow(&HashMap::new(), &other_writes),
            CommitResult::Committed(1)
        );

        let mut writes = BTreeMap::new();
        writes.insert(1, 1.0);
        assert_eq!(store.commit_slow(&reads, &writes), CommitResult::Conflict);
        // The conflicting attempt must not have installed anything.
        assert_eq!(store.read_latest(1).unwrap(), 5.0);
        assert_eq!(store.latest_version_after(1, 1), None);
    }

    #[test]
    fn disjoint_commits_both_succeed() {
        let store = VersionedStore::new();
        store.create_key(1, 0.0).unwrap();
        store.create_key(2, 0.0).unwrap();

        let mut reads_a = HashMap::new();
        reads_a.insert(1, observation(0.0, 0));
        let mut writes_a = BTreeMap::new();
        writes_a.insert(1, 1.0);

        let mut reads_b = HashMap::new();
        reads_b.insert(2, observation(0.0, 0));
        let mut writes_b = BTreeMap::new();
        writes_b.insert(2, 2.0);

        assert_eq!(
            store.commit_slow(&reads_a, &writes_a),
            CommitResult::Committed(1)
        );
        assert_eq!(
            store.commit_slow(&reads_b, &writes_b),
            CommitResult::Committed(2)
        );
    }

    #[test]
    fn write_to_unknown_key_creates_chain_at_commit() {
        let store = VersionedStore::new();
        assert_eq!(store.key_count(), 0);

        let mut writes = BTreeMap::new();
        writes.insert(9, 3.0);
        assert_eq!(
            store.commit_slow(&HashMap::new(), &writes),
            CommitResult::Committed(1)
        );
        assert_eq!(store.key_count(), 1);
        assert_eq!(store.read_latest(9).unwrap(), 3.0);
        // A snapshot taken before the creating commit sees nothing.
        assert_eq!(
            store.snapshot_at(9, 0),
            Err(StmError::NoVisibleVersion { key: 9, start_ts: 0 })
        );
    }

    #[test]
    fn standalone_transaction_via_begin() {
        let store = VersionedStore::new();
        store.create_key(1, 10.0).unwrap();

        // The scheduler-free entry point: callers drive the attempt
        // themselves.
        let mut txn = store.begin(CommitMode::Slow);
        let value = txn.read(1).unwrap();
        txn.write(1, value * 2.0);
        assert_eq!(txn.commit(), CommitResult::Committed(1));
        assert_eq!(store.read_latest(1).unwrap(), 20.0);
    }

    #[test]
    fn fast_commit_with_certain_success_installs_without_validation() {
        let store = VersionedStore::new();
        store.create_key(1, 0.0).unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(1, 1.0);
        assert_eq!(
            store.commit_fast(&writes, 1.0),
            CommitResult::Committed(1)
        );
        assert_eq!(store.read_latest(1).unwrap(), 1.0);
    }

    #[test]
    fn fast_commit_with_zero_success_rate_always_aborts() {
        let store = VersionedStore::new();
        store.create_key(1, 0.0).unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(1, 1.0);
        assert_eq!(store.commit_fast(&writes, 0.0), CommitResult::SpuriousAbort);
        assert_eq!(store.read_latest(1).unwrap(), 0.0);
        assert_eq!(store.now(), 0);
    }

    #[test]
    fn prune_preserves_snapshot_contract_at_horizon() {
        let store = VersionedStore::new();
        store.create_key(1, 0.0).unwrap();
        for v in 1..=4 {
            let mut writes = BTreeMap::new();
            writes.insert(1, v as Value);
            store.commit_slow(&HashMap::new(), &writes);
        }
        // Versions 0..=4 exist; a live snapshot at ts 2 must survive.
        let stats = store.prune_versions(2);
        assert_eq!(stats.chains_pruned, 1);
        assert_eq!(stats.versions_removed, 2);
        assert_eq!(store.snapshot_at(1, 2).unwrap(), (2.0, 2));
        assert_eq!(store.read_latest(1).unwrap(), 4.0);
    }
}
