//! Helpers shared by unit and integration tests.

use std::sync::Arc;

use argon2::Params;
use giftlist_storage::Storage;
use giftlist_traits::{AuditEvent, AuditEventKind, AuditSink};
use parking_lot::Mutex;
use redb::{Database, WriteTransaction};

use crate::config::AccessConfig;
use crate::password::Argon2PasswordVerifier;
use crate::storage::Records;
use crate::GiftCore;

/// Denial floor used by tests; short, but long enough to measure.
pub const TEST_DENIAL_FLOOR_MS: u64 = 30;

pub fn fast_config() -> AccessConfig {
    AccessConfig {
        denial_floor_ms: TEST_DENIAL_FLOOR_MS,
        ..AccessConfig::default()
    }
}

/// Argon2id with minimal cost parameters.
pub fn fast_verifier() -> Arc<Argon2PasswordVerifier> {
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    Arc::new(Argon2PasswordVerifier::with_params(params).expect("dummy hash"))
}

/// Audit sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events.lock().iter().map(|event| event.kind).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

pub fn create_test_core_with(config: AccessConfig) -> (GiftCore, Arc<RecordingAuditSink>) {
    let storage = Arc::new(Storage::in_memory().expect("in-memory storage"));
    let audit = Arc::new(RecordingAuditSink::default());
    let core = GiftCore::with_collaborators(storage, config, fast_verifier(), audit.clone())
        .expect("test core");
    (core, audit)
}

pub fn create_test_core() -> (GiftCore, Arc<RecordingAuditSink>) {
    create_test_core_with(fast_config())
}

/// Write records directly, bypassing services and permission checks.
pub fn seed<F>(db: &Arc<Database>, write: F)
where
    F: FnOnce(&Records<'_, WriteTransaction>) -> anyhow::Result<()>,
{
    let txn = db.begin_write().expect("begin write");
    {
        let records = Records::new(&txn);
        write(&records).expect("seed records");
    }
    txn.commit().expect("commit seed");
}
