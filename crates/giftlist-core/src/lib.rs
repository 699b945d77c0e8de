pub mod audit;
pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod permission;
pub mod reservation;
pub mod services;
pub mod storage;
pub mod telemetry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;
mod txn;

pub use config::AccessConfig;
pub use error::{CoreError, ValidationError};
pub use models::*;

use std::sync::Arc;

use giftlist_storage::Storage;
use giftlist_traits::{AuditSink, PasswordVerifier};
use tracing::info;

use audit::TracingAuditSink;
use password::Argon2PasswordVerifier;
use permission::{DenialFloor, PermissionEngine, Policy};
use reservation::ReservationCoordinator;
use services::{AccountService, GroupService, ListService, WishService};
use storage::AccountStore;
use txn::GuardedWriter;

/// Access core shared by whatever transport embeds it
///
/// Every component shares one redb database. Nothing here is global: build
/// one `GiftCore` per database and clone the services out of it as needed.
pub struct GiftCore {
    pub storage: Arc<Storage>,
    pub config: AccessConfig,
    pub permissions: PermissionEngine,
    pub reservations: ReservationCoordinator,
    pub lists: ListService,
    pub wishes: WishService,
    pub groups: GroupService,
    pub accounts: AccountService,
}

impl GiftCore {
    /// Open (or create) the database at `db_path` with Argon2id passwords
    /// and audit events written to the log.
    pub async fn new(db_path: &str, config: AccessConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(db_path)?);
        let verifier = Arc::new(Argon2PasswordVerifier::new()?);
        Self::with_collaborators(storage, config, verifier, Arc::new(TracingAuditSink))
    }

    pub fn in_memory(config: AccessConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::in_memory()?);
        let verifier = Arc::new(Argon2PasswordVerifier::new()?);
        Self::with_collaborators(storage, config, verifier, Arc::new(TracingAuditSink))
    }

    /// Wire the core around caller-supplied collaborators.
    pub fn with_collaborators(
        storage: Arc<Storage>,
        config: AccessConfig,
        verifier: Arc<dyn PasswordVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let db = storage.get_db();
        let policy = Policy::new(verifier, config.anonymous_reservations);
        let floor = DenialFloor::new(config.denial_floor());
        let writer = GuardedWriter::new(db.clone(), policy.clone(), config.txn_limits(), floor);
        let permissions = PermissionEngine::new(db.clone(), policy, floor);

        let reservations = ReservationCoordinator::new(writer.clone(), audit.clone());
        let lists = ListService::new(
            writer.clone(),
            permissions.clone(),
            storage.lists.clone(),
            audit.clone(),
        );
        let wishes = WishService::new(writer.clone(), permissions.clone(), audit.clone());
        let groups = GroupService::new(writer, permissions.clone(), audit);
        let accounts = AccountService::new(AccountStore::new(db)?);

        info!(
            denial_floor_ms = config.denial_floor_ms,
            anonymous_reservations = config.anonymous_reservations,
            "Initializing giftlist access core"
        );

        Ok(Self {
            storage,
            config,
            permissions,
            reservations,
            lists,
            wishes,
            groups,
            accounts,
        })
    }
}
