use crate::txn::{Timestamp, Value};

/// A single committed value of one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Version {
    pub ts: Timestamp,
    pub value: Value,
}

/// Append-only sequence of versions for one key, ordered by strictly
/// increasing commit timestamp. Lookups are binary searches over the
/// sorted vector.
#[derive(Debug, Default)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    pub fn with_initial(ts: Timestamp, value: Value) -> Self {
        Self {
            versions: vec![Version { ts, value }],
        }
    }

    /// Append a version. Callers must hold the commit lock and guarantee
    /// `ts` exceeds the current chain maximum.
    pub fn push(&mut self, ts: Timestamp, value: Value) {
        debug_assert!(self.versions.last().is_none_or(|v| v.ts < ts));
        self.versions.push(Version { ts, value });
    }

    /// The newest version with `ts <= at`, if any.
    pub fn visible_at(&self, at: Timestamp) -> Option<Version> {
        let idx = self.versions.partition_point(|v| v.ts <= at);
        if idx == 0 {
            None
        } else {
            Some(self.versions[idx - 1])
        }
    }

    /// The smallest version timestamp strictly greater than `after`, if any.
    pub fn first_after(&self, after: Timestamp) -> Option<Timestamp> {
        let idx = self.versions.partition_point(|v| v.ts <= after);
        self.versions.get(idx).map(|v| v.ts)
    }

    pub fn latest(&self) -> Option<Version> {
        self.versions.last().copied()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Remove versions that no snapshot at or after `horizon` can observe:
    /// everything older than the newest version with `ts <= horizon`.
    /// Returns the number of versions removed.
    pub fn truncate_obsolete(&mut self, horizon: Timestamp) -> usize {
        let visible = self.versions.partition_point(|v| v.ts <= horizon);
        if visible <= 1 {
            return 0;
        }
        let removed = visible - 1;
        self.versions.drain(..removed);
        removed
    }
}
