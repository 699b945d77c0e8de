//! Audit sinks.
//!
//! Every sink here returns immediately from `emit`; none of them can fail the
//! operation that produced the event.

use giftlist_traits::{AuditEvent, AuditSink};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            target: "giftlist_audit",
            kind = ?event.kind,
            actor_id = event.actor_id.as_deref().unwrap_or("-"),
            subject_id = %event.subject_id,
            details = %event.details,
            "audit"
        );
    }
}

/// Forwards events to a bounded channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Create a sink and the receiver an external persister drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(err) = self.tx.try_send(event) {
            debug!(error = %err, "Dropping audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giftlist_traits::AuditEventKind;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelAuditSink::new(4);
        sink.emit(AuditEvent::new(AuditEventKind::WishCreated, Some("u"), "w-1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, AuditEventKind::WishCreated);
        assert_eq!(event.subject_id, "w-1");
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelAuditSink::new(1);
        sink.emit(AuditEvent::new(AuditEventKind::ListCreated, None, "l-1"));
        sink.emit(AuditEvent::new(AuditEventKind::ListDeleted, None, "l-1"));
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().kind, AuditEventKind::ListCreated);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelAuditSink::new(1);
        drop(rx);
        sink.emit(AuditEvent::new(AuditEventKind::GroupCreated, None, "g-1"));
    }
}
