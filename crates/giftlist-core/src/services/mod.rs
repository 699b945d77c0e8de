//! Management services: the state changes around reservations.

pub mod account;
pub mod group;
pub mod list;
pub mod wish;

pub use account::AccountService;
pub use group::GroupService;
pub use list::ListService;
pub use wish::WishService;

use std::sync::Arc;

use anyhow::anyhow;
use giftlist_storage::SnapshotMut;
use giftlist_traits::PasswordVerifier;

use crate::error::Result;
use crate::storage::Records;

/// Hash a password on the blocking pool.
pub(crate) async fn hash_password(
    verifier: Arc<dyn PasswordVerifier>,
    password: String,
) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || verifier.hash_password(&password))
        .await
        .map_err(|err| anyhow!("password hashing task failed: {err}"))??;
    Ok(hash)
}

/// Drop the reservations of a wish that no longer sits on any list.
pub(crate) fn release_if_unlisted<S: SnapshotMut + ?Sized>(
    records: &Records<'_, S>,
    wish_id: &str,
) -> Result<usize> {
    if !records.wish_list_ids(wish_id)?.is_empty() {
        return Ok(0);
    }
    Ok(records.clear_wish_reservations(wish_id)?)
}
