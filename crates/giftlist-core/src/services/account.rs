//! Identity flags read by the account gate.

use giftlist_storage::clock;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::Account;
use crate::storage::AccountStore;

#[derive(Debug, Clone)]
pub struct AccountService {
    store: AccountStore,
}

impl AccountService {
    pub(crate) fn new(store: AccountStore) -> Self {
        Self { store }
    }

    pub fn upsert(&self, account: &Account) -> Result<()> {
        self.store.upsert(account)?;
        info!(user_id = %account.id, is_admin = account.is_admin, "Account saved");
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.store.get(user_id)?)
    }

    /// Suspend an account. A suspended account has no permissions at all,
    /// admin or not.
    pub fn suspend(&self, user_id: &str) -> Result<Account> {
        let account = self.store.suspend(user_id, clock::now_ms())?;
        warn!(user_id = %user_id, "Account suspended");
        Ok(account)
    }

    pub fn reinstate(&self, user_id: &str) -> Result<Option<Account>> {
        let account = self.store.reinstate(user_id)?;
        if account.is_some() {
            info!(user_id = %user_id, "Account reinstated");
        }
        Ok(account)
    }
}
