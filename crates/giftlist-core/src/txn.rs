//! Write transactions that authorize and mutate against the same state.

use std::sync::Arc;
use std::time::Instant;

use giftlist_storage::{Snapshot, TxnLimits, run_write};
use redb::{Database, WriteTransaction};

use crate::error::{CoreError, Result};
use crate::models::{Action, Credential, Resource};
use crate::permission::{DenialFloor, Policy};

/// Check `action` with the snapshot the caller already holds.
pub(crate) fn authorize<S: Snapshot + ?Sized>(
    policy: &Policy,
    snap: &S,
    actor: Option<&str>,
    action: Action,
    resource: &Resource,
    credential: Option<&Credential>,
) -> Result<()> {
    let decision = policy.decide(snap, actor, action, resource, credential)?;
    match decision.denial_reason() {
        None => Ok(()),
        Some(reason) => Err(CoreError::from_denial(reason)),
    }
}

/// Runs bounded write transactions and pads denials to the floor once the
/// transaction has ended.
#[derive(Clone)]
pub(crate) struct GuardedWriter {
    db: Arc<Database>,
    policy: Policy,
    limits: TxnLimits,
    floor: DenialFloor,
}

impl GuardedWriter {
    pub(crate) fn new(
        db: Arc<Database>,
        policy: Policy,
        limits: TxnLimits,
        floor: DenialFloor,
    ) -> Self {
        Self {
            db,
            policy,
            limits,
            floor,
        }
    }

    pub(crate) fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    pub(crate) fn policy(&self) -> &Policy {
        &self.policy
    }

    pub(crate) fn floor(&self) -> DenialFloor {
        self.floor
    }

    /// Run `body` in one write transaction. Contention becomes
    /// `Conflict(conflict_message)`.
    pub(crate) async fn write<T, F>(&self, conflict_message: &str, body: F) -> Result<T>
    where
        F: FnOnce(&WriteTransaction, &Policy) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let policy = self.policy.clone();
        let result = run_write(self.db.clone(), self.limits, move |txn| body(txn, &policy))
            .await
            .map_err(|err| CoreError::from_txn(err, conflict_message));

        if let Err(err) = &result
            && err.is_denial()
        {
            self.floor.pad(started).await;
        }
        result
    }
}
