//! Single-table record stores for data read outside a permission decision.
//!
//! Each call opens its own short transaction and goes through the same
//! `Snapshot` surface the transactional code uses. Anything that has to stay
//! consistent with other tables belongs in `txn::run_write` instead.

use anyhow::Result;
use redb::{Database, ReadableDatabase};
use std::sync::Arc;

use crate::snapshot::{Snapshot, SnapshotMut};
use crate::tables::RecordTable;

pub trait RecordStore: Send + Sync {
    const TABLE: RecordTable;

    fn database(&self) -> &Arc<Database>;

    fn with_snapshot<T>(&self, f: impl FnOnce(&dyn Snapshot) -> Result<T>) -> Result<T> {
        let read_txn = self.database().begin_read()?;
        f(&read_txn)
    }

    fn with_writer<T>(&self, f: impl FnOnce(&dyn SnapshotMut) -> Result<T>) -> Result<T> {
        let write_txn = self.database().begin_write()?;
        let out = f(&write_txn)?;
        write_txn.commit()?;
        Ok(out)
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_snapshot(|snap| snap.read(Self::TABLE, key))
    }

    fn entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.with_snapshot(|snap| snap.scan_all(Self::TABLE))
    }

    fn store(&self, key: &str, record: &[u8]) -> Result<()> {
        self.with_writer(|txn| txn.write(Self::TABLE, key, record))
    }

    /// Returns whether a record was removed.
    fn remove(&self, key: &str) -> Result<bool> {
        self.with_writer(|txn| txn.remove(Self::TABLE, key))
    }
}

/// Declare a `RecordStore` bound to one of the tables in `crate::tables`.
#[macro_export]
macro_rules! record_store {
    ( $(#[$meta:meta])* $vis:vis struct $name:ident => $table:path ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            db: std::sync::Arc<redb::Database>,
        }

        impl $name {
            pub fn new(db: std::sync::Arc<redb::Database>) -> anyhow::Result<Self> {
                let txn = db.begin_write()?;
                txn.open_table($table)?;
                txn.commit()?;
                Ok(Self { db })
            }
        }

        impl $crate::RecordStore for $name {
            const TABLE: $crate::tables::RecordTable = $table;

            fn database(&self) -> &std::sync::Arc<redb::Database> {
                &self.db
            }
        }
    };
}
