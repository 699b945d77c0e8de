//! Giftlist Storage - Low-level storage abstraction layer
//!
//! This crate provides the persistence layer for the giftlist access core,
//! using redb as the embedded database. It exposes byte-level APIs; typed
//! records live in giftlist-core.
//!
//! # Tables
//!
//! - `accounts` - Identity flags (admin, suspended)
//! - `lists`, `list_co_managers`, `list_group_shares` - Lists and delegation
//! - `wishes`, `wish_lists`, `list_wishes` - Wishes and list membership
//! - `groups`, `group_members`, `user_groups` - Groups
//! - `reservations`, `wish_reservations` - Reservations
//!
//! # Transactions
//!
//! Reads that feed an authorization decision go through `Snapshot`, which is
//! implemented for both read and write transactions. Multi-table writes go
//! through `txn::run_write`.

pub mod account;
pub mod clock;
pub mod list;
pub mod record_store;
pub mod snapshot;
pub mod tables;
pub mod txn;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

pub use account::AccountStorage;
pub use list::ListStorage;
pub use record_store::RecordStore;
pub use snapshot::{Snapshot, SnapshotMut};
pub use txn::{TxnError, TxnLimits, run_read, run_write};

/// Central storage manager that initializes all tables
pub struct Storage {
    db: Arc<Database>,
    pub accounts: AccountStorage,
    pub lists: ListStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: &str) -> Result<Self> {
        Self::from_db(Database::create(path)?)
    }

    /// Create a storage instance backed by memory only.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::from_db(db)
    }

    fn from_db(db: Database) -> Result<Self> {
        tables::init_tables(&db)?;
        let db = Arc::new(db);

        let accounts = AccountStorage::new(db.clone())?;
        let lists = ListStorage::new(db.clone())?;

        Ok(Self { db, accounts, lists })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::ReadableDatabase;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_every_table() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("giftlist.db");
        let storage = Storage::new(path.to_str().unwrap()).unwrap();

        let read_txn = storage.get_db().begin_read().unwrap();
        for table in tables::ALL_TABLES {
            assert!(read_txn.scan_all(table).unwrap().is_empty());
        }
    }
}
