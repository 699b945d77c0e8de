//! Giftlist Traits - seams between the access core and its collaborators.
//!
//! The core consumes two external services it does not implement itself:
//! - `PasswordVerifier`: the memory-hard hash/verify primitive
//! - `AuditSink`: fire-and-forget audit event emission

pub mod audit;
pub mod password;

pub use audit::{AuditEvent, AuditEventKind, AuditSink, NoopAuditSink};
pub use password::PasswordVerifier;
