pub mod registry;
pub mod transaction;

pub use registry::SnapshotRegistry;
pub use transaction::{CommitMode, ReadObservation, Transaction};

/// Identifier of a store cell.
pub type Key = u64;

/// Stored scalar.
pub type Value = f64;

/// Commit timestamps assigned by the global clock.
pub type Timestamp = u64;

/// Timestamp carried by versions installed through `create_key`.
pub const TS_INITIAL: Timestamp = 0;
