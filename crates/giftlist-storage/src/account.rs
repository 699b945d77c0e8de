//! Account flags consulted by the permission engine.

use crate::record_store;
use crate::tables::ACCOUNTS;

record_store! {
    /// Raw account records keyed by user ID.
    pub struct AccountStorage => ACCOUNTS
}
