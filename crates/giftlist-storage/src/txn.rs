//! Bounded transaction runners.
//!
//! redb admits one write transaction at a time and every write transaction
//! reads the latest committed state plus its own writes, so a read-check-write
//! body executed through `run_write` is serializable with respect to every
//! other writer. The runner moves the blocking redb work onto the blocking
//! thread pool and bounds it with an acquisition wait and an execution timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use redb::{Database, ReadTransaction, ReadableDatabase, WriteTransaction};
use thiserror::Error;
use tracing::warn;

/// Time limits for a single write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnLimits {
    /// Longest wait for the writer slot
    pub acquire_timeout: Duration,
    /// Longest time the body may run once the slot is held
    pub execution_timeout: Duration,
}

impl TxnLimits {
    pub fn new(acquire_timeout: Duration, execution_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            execution_timeout,
        }
    }

    /// Upper bound on how long a caller of `run_write` waits.
    pub fn total(&self) -> Duration {
        self.acquire_timeout + self.execution_timeout
    }
}

impl Default for TxnLimits {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(5))
    }
}

/// Failure of a bounded write transaction.
///
/// `Body` carries the body's own error unchanged; every other variant means
/// nothing was committed.
#[derive(Debug, Error)]
pub enum TxnError<E> {
    #[error("timed out after {0:?} waiting for the write transaction")]
    AcquireTimeout(Duration),

    #[error("write transaction exceeded its {0:?} execution budget")]
    ExecutionTimeout(Duration),

    #[error("write transaction abandoned by the caller")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(anyhow::Error),

    #[error("{0}")]
    Body(E),
}

impl<E> TxnError<E> {
    /// True when the transaction lost a race for time rather than failing.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            TxnError::AcquireTimeout(_) | TxnError::ExecutionTimeout(_) | TxnError::Cancelled
        )
    }
}

const RUNNING: u8 = 0;
const COMMITTING: u8 = 1;
const CANCELLED: u8 = 2;

fn abort_quietly(txn: WriteTransaction) {
    if let Err(err) = txn.abort() {
        warn!(error = %err, "Failed to abort write transaction");
    }
}

/// Run `body` inside one write transaction and commit it if it succeeds.
///
/// The body's error aborts the transaction. If the caller-side deadline
/// (`limits.total()`) passes first, the runner and the blocking body race on
/// a shared state: whichever claims it first decides the outcome. A body that
/// already started committing is awaited and its real result returned, so
/// `TxnError::Cancelled` is only reported for transactions that never commit.
pub async fn run_write<T, E, F>(
    db: Arc<Database>,
    limits: TxnLimits,
    body: F,
) -> Result<T, TxnError<E>>
where
    F: FnOnce(&WriteTransaction) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let state = Arc::new(AtomicU8::new(RUNNING));
    let body_state = state.clone();
    let requested_at = Instant::now();

    let mut handle = tokio::task::spawn_blocking(move || {
        let txn = db
            .begin_write()
            .map_err(|err| TxnError::Storage(err.into()))?;

        if requested_at.elapsed() > limits.acquire_timeout
            || body_state.load(Ordering::SeqCst) == CANCELLED
        {
            abort_quietly(txn);
            return Err(TxnError::AcquireTimeout(limits.acquire_timeout));
        }

        let acquired_at = Instant::now();
        let value = match body(&txn) {
            Ok(value) => value,
            Err(err) => {
                abort_quietly(txn);
                return Err(TxnError::Body(err));
            }
        };

        if acquired_at.elapsed() > limits.execution_timeout {
            abort_quietly(txn);
            return Err(TxnError::ExecutionTimeout(limits.execution_timeout));
        }

        if body_state
            .compare_exchange(RUNNING, COMMITTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            abort_quietly(txn);
            return Err(TxnError::Cancelled);
        }

        txn.commit().map_err(|err| TxnError::Storage(err.into()))?;
        Ok(value)
    });

    let joined = match tokio::time::timeout(limits.total(), &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            let claimed =
                state.compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst);
            if claimed.is_ok() {
                return Err(TxnError::Cancelled);
            }
            // The body is past the point of no return; report what it did.
            handle.await
        }
    };

    joined.unwrap_or_else(|join_err| {
        Err(TxnError::Storage(anyhow!(
            "write transaction task failed: {join_err}"
        )))
    })
}

/// Run `body` against a fresh read snapshot on the blocking pool.
pub async fn run_read<T, F>(db: Arc<Database>, body: F) -> anyhow::Result<T>
where
    F: FnOnce(&ReadTransaction) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let txn = db.begin_read()?;
        body(&txn)
    })
    .await
    .map_err(|err| anyhow!("read transaction task failed: {err}"))?
}
