//! Error taxonomy of the access core.

use giftlist_storage::TxnError;
use thiserror::Error;
use tracing::warn;

use crate::models::DenialReason;

/// A well-formed request that would break a domain invariant.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("already reserved")]
    AlreadyReserved,

    #[error("fully reserved")]
    FullyReserved,

    #[error("you cannot reserve your own wish")]
    SelfReservation,

    #[error("a group must keep at least one admin")]
    LastAdmin,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("password visibility requires a password")]
    PasswordRequired,

    #[error("the owner cannot be a co-manager of their own list")]
    OwnerCannotBeCoManager,

    #[error("user is not a member of this group")]
    NotAMember,
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Resource is absent, or must look absent to this caller
    #[error("Not found")]
    NotFound,

    /// Resource exists, the caller may know that, and lacks the right
    #[error("Forbidden: {0}")]
    Forbidden(DenialReason),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Lost a race against a concurrent transaction; safe to retry
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Message used when a reservation write loses a race.
pub const RESERVE_CONFLICT: &str = "someone else just reserved this, refresh and try again";

/// Message used when any other write loses a race.
pub const WRITE_CONFLICT: &str = "the request collided with another change, try again";

impl CoreError {
    /// Classify a denial into NotFound or Forbidden.
    ///
    /// Every denial that leaves the core as an error goes through here.
    pub fn from_denial(reason: DenialReason) -> Self {
        if reason.is_not_found() {
            CoreError::NotFound
        } else {
            CoreError::Forbidden(reason)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }

    /// Whether this error is an authorization denial, which gets padded to
    /// the denial floor before it is returned.
    pub fn is_denial(&self) -> bool {
        matches!(self, CoreError::NotFound | CoreError::Forbidden(_))
    }

    /// Flatten a bounded-transaction failure, reporting contention as
    /// `Conflict(conflict_message)`.
    pub fn from_txn(err: TxnError<CoreError>, conflict_message: &str) -> Self {
        match err {
            TxnError::Body(err) => err,
            TxnError::Storage(err) => CoreError::Storage(err),
            contention => {
                warn!(error = %contention, "Write transaction lost a race");
                CoreError::Conflict(conflict_message.to_string())
            }
        }
    }
}

impl From<TxnError<CoreError>> for CoreError {
    fn from(err: TxnError<CoreError>) -> Self {
        CoreError::from_txn(err, WRITE_CONFLICT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_denial_classifies_not_found() {
        assert!(matches!(
            CoreError::from_denial(DenialReason::NotFound),
            CoreError::NotFound
        ));
        assert!(matches!(
            CoreError::from_denial(DenialReason::OnlyOwnerMayDelete),
            CoreError::Forbidden(DenialReason::OnlyOwnerMayDelete)
        ));
        assert!(matches!(
            CoreError::from_denial(DenialReason::PasswordRequired),
            CoreError::Forbidden(DenialReason::PasswordRequired)
        ));
    }

    #[test]
    fn test_contention_becomes_retryable_conflict() {
        let err = CoreError::from_txn(
            TxnError::AcquireTimeout(Duration::from_millis(5)),
            RESERVE_CONFLICT,
        );
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), format!("Conflict: {RESERVE_CONFLICT}"));

        let err: CoreError = TxnError::Cancelled.into();
        assert!(matches!(err, CoreError::Conflict(ref msg) if msg == WRITE_CONFLICT));
    }

    #[test]
    fn test_body_error_passes_through() {
        let err = CoreError::from_txn(
            TxnError::Body(ValidationError::FullyReserved.into()),
            RESERVE_CONFLICT,
        );
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::FullyReserved)
        ));
        assert!(!err.is_retryable());
    }
}
