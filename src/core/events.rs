use std::sync::Arc;

use crate::core::errors::StmError;
use crate::txn::Timestamp;

/// Terminal outcome of a scheduled transaction, delivered to the configured
/// event sink. Per-attempt conflicts and speculative aborts are not reported
/// here; they are internal to the retry loop.
#[derive(Debug, Clone)]
pub enum TxnEvent {
    /// The transaction committed; `attempts` counts the committing attempt.
    Committed {
        description: String,
        end_ts: Timestamp,
        attempts: u32,
    },
    /// The closure signalled an error (domain rejection, missing key,
    /// invisible snapshot). The attempt's writes were discarded and the
    /// transaction was not retried.
    UserAborted {
        description: String,
        error: StmError,
    },
    /// Every commit attempt failed with a conflict or speculative abort.
    /// The store is unchanged.
    RetryExhausted {
        description: String,
        attempts: u32,
    },
}

/// Pluggable outcome observer. The engine never writes to an output stream
/// itself; callers decide where outcomes go.
pub type EventSink = Arc<dyn Fn(&TxnEvent) + Send + Sync>;

/// Ready-made sink that reports outcomes on stderr.
pub fn stderr_sink() -> EventSink {
    Arc::new(|event| match event {
        TxnEvent::Committed {
            description,
            end_ts,
            attempts,
        } => {
            eprintln!("transaction succeeded: {description} (ts {end_ts}, {attempts} attempt(s))");
        }
        TxnEvent::UserAborted { description, error } => {
            eprintln!("transaction error: {description}: {error}");
        }
        TxnEvent::RetryExhausted {
            description,
            attempts,
        } => {
            eprintln!("transaction failed after {attempts} attempts: {description}");
        }
    })
}
