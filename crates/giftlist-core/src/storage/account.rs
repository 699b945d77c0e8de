//! Typed account storage wrapper.

use anyhow::Result;
use giftlist_storage::{RecordStore, Snapshot, SnapshotMut};
use redb::Database;
use std::sync::Arc;

use crate::models::Account;

/// Typed account storage wrapper around giftlist-storage::AccountStorage.
#[derive(Debug, Clone)]
pub struct AccountStore {
    inner: giftlist_storage::AccountStorage,
}

impl AccountStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: giftlist_storage::AccountStorage::new(db)?,
        })
    }

    /// Create or replace an account
    pub fn upsert(&self, account: &Account) -> Result<()> {
        let json = serde_json::to_vec(account)?;
        self.inner.store(&account.id, &json)
    }

    /// Get an account by ID
    pub fn get(&self, id: &str) -> Result<Option<Account>> {
        match self.inner.load(id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read, change and write one account inside a single write transaction.
    fn update<F>(&self, id: &str, change: F) -> Result<Option<Account>>
    where
        F: FnOnce(Option<Account>) -> Option<Account>,
    {
        let table = giftlist_storage::AccountStorage::TABLE;
        self.inner.with_writer(|txn| {
            let current = match txn.read(table, id)? {
                Some(bytes) => Some(serde_json::from_slice(&bytes)?),
                None => None,
            };
            let Some(updated) = change(current) else {
                return Ok(None);
            };
            txn.write(table, id, &serde_json::to_vec(&updated)?)?;
            Ok(Some(updated))
        })
    }

    /// Mark an account suspended, creating the record if needed
    pub fn suspend(&self, id: &str, at_ms: i64) -> Result<Account> {
        let suspended = self.update(id, |current| {
            let mut account = current.unwrap_or_else(|| Account::new(id));
            account.suspended_at = Some(at_ms);
            Some(account)
        })?;
        suspended.ok_or_else(|| anyhow::anyhow!("Account {} vanished while suspending", id))
    }

    /// Lift a suspension. Returns None if the account is unknown.
    pub fn reinstate(&self, id: &str) -> Result<Option<Account>> {
        self.update(id, |current| {
            current.map(|mut account| {
                account.suspended_at = None;
                account
            })
        })
    }

    /// Delete an account
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.remove(id)
    }
}
