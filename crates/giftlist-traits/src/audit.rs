//! Audit event seam.
//!
//! Audit persistence lives outside the core. The core only hands events to an
//! `AuditSink` and never waits on, or reacts to, what the sink does with them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of an audited state change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ReservationCreated,
    ReservationCancelled,
    ListCreated,
    ListVisibilityChanged,
    ListShareTokenRotated,
    ListDeleted,
    CoManagerAdded,
    CoManagerRemoved,
    ListSharedWithGroup,
    ListUnsharedWithGroup,
    WishCreated,
    WishDeleted,
    GroupCreated,
    GroupMemberAdded,
    GroupMemberRoleChanged,
    GroupMemberRemoved,
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    /// User that triggered the change (None for system actions)
    pub actor_id: Option<String>,
    /// Primary entity the event is about
    pub subject_id: String,
    /// Free-form extra context
    #[serde(default)]
    pub details: Value,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl AuditEvent {
    pub fn new(
        kind: AuditEventKind,
        actor_id: Option<&str>,
        subject_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            actor_id: actor_id.map(str::to_string),
            subject_id: subject_id.into(),
            details: Value::Null,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Receiver for audit events.
///
/// `emit` must return promptly and must not fail the caller; sinks that do
/// I/O are expected to queue and drop rather than block.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}
