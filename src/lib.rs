//! In-memory software transactional memory with MVCC snapshots and a
//! priority-scheduled worker pool.
//!
//! Keys map to append-only version chains tagged with commit timestamps
//! from a global clock. Submitted closures run on worker threads against a
//! per-attempt [`Transaction`] that buffers reads and writes; commits
//! validate the read set under a single commit lock and install the write
//! set as new versions. Failed attempts are retried with backoff; an
//! optional speculative fast path installs without validation and falls
//! back to the validating path when it spuriously fails.
//!
//! ```
//! use mvstm::StmEngine;
//!
//! let engine = StmEngine::new(4);
//! engine.create_key(100, 5.0).unwrap();
//! engine
//!     .submit(1, "increment", |txn| {
//!         let value = txn.read(100)?;
//!         txn.write(100, value + 1.0);
//!         Ok(())
//!     })
//!     .unwrap();
//! engine.wait_for_idle();
//! assert_eq!(engine.read_latest(100).unwrap(), 6.0);
//! ```

mod core;
mod engine;
mod scheduler;
mod store;
mod txn;

pub use crate::core::errors::StmError;
pub use crate::core::events::{stderr_sink, EventSink, TxnEvent};
pub use crate::core::stats::StatsSnapshot;
pub use crate::engine::{EngineConfig, StmEngine};
pub use crate::store::{CommitResult, PruneStats, Version, VersionChain, VersionedStore};
pub use crate::txn::{CommitMode, Key, Timestamp, Transaction, Value, TS_INITIAL};
