//! Table definitions and composite key helpers.
//!
//! Every table maps a `&str` key to a JSON-encoded record. Relation tables use
//! composite keys `"{left}\u{1f}{right}"` so that all rows for one `left` ID
//! form a contiguous range.

use anyhow::Result;
use redb::{Database, TableDefinition};

pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Accounts table: user_id -> JSON Account
pub const ACCOUNTS: RecordTable = TableDefinition::new("accounts");
/// Lists table: list_id -> JSON GiftList
pub const LISTS: RecordTable = TableDefinition::new("lists");
/// Co-managers: "{list_id}\u{1f}{user_id}" -> JSON CoManager
pub const LIST_CO_MANAGERS: RecordTable = TableDefinition::new("list_co_managers");
/// Group shares: "{list_id}\u{1f}{group_id}" -> JSON GroupShare
pub const LIST_GROUP_SHARES: RecordTable = TableDefinition::new("list_group_shares");
/// Wishes table: wish_id -> JSON Wish
pub const WISHES: RecordTable = TableDefinition::new("wishes");
/// Membership: "{wish_id}\u{1f}{list_id}" -> JSON WishMembership
pub const WISH_LISTS: RecordTable = TableDefinition::new("wish_lists");
/// Reverse membership: "{list_id}\u{1f}{wish_id}" -> JSON WishMembership
pub const LIST_WISHES: RecordTable = TableDefinition::new("list_wishes");
/// Groups table: group_id -> JSON Group
pub const GROUPS: RecordTable = TableDefinition::new("groups");
/// Members: "{group_id}\u{1f}{user_id}" -> JSON GroupMember
pub const GROUP_MEMBERS: RecordTable = TableDefinition::new("group_members");
/// Reverse membership: "{user_id}\u{1f}{group_id}" -> JSON GroupMember
pub const USER_GROUPS: RecordTable = TableDefinition::new("user_groups");
/// Reservations table: reservation_id -> JSON Reservation
pub const RESERVATIONS: RecordTable = TableDefinition::new("reservations");
/// Index: "{wish_id}\u{1f}{reservation_id}" -> JSON Reservation
pub const WISH_RESERVATIONS: RecordTable = TableDefinition::new("wish_reservations");

pub const ALL_TABLES: [RecordTable; 12] = [
    ACCOUNTS,
    LISTS,
    LIST_CO_MANAGERS,
    LIST_GROUP_SHARES,
    WISHES,
    WISH_LISTS,
    LIST_WISHES,
    GROUPS,
    GROUP_MEMBERS,
    USER_GROUPS,
    RESERVATIONS,
    WISH_RESERVATIONS,
];

/// Separator between the two halves of a composite key.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Build `"{left}\u{1f}{right}"`.
pub fn composite_key(left: &str, right: &str) -> String {
    format!("{left}{KEY_SEPARATOR}{right}")
}

/// Build the range prefix covering every composite key that starts with `left`.
pub fn key_prefix(left: &str) -> String {
    format!("{left}{KEY_SEPARATOR}")
}

/// Exclusive upper bound for a prefix scan: the prefix with its last char
/// bumped by one. `None` means the scan is unbounded above.
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut bound = prefix.to_string();
    let last = bound.pop()?;
    let next = char::from_u32(last as u32 + 1)?;
    bound.push(next);
    Some(bound)
}

/// Create every table so later read transactions never see a missing table.
pub fn init_tables(db: &Database) -> Result<()> {
    let write_txn = db.begin_write()?;
    for table in ALL_TABLES {
        write_txn.open_table(table)?;
    }
    write_txn.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_shares_prefix() {
        let key = composite_key("list-1", "user-9");
        assert!(key.starts_with(&key_prefix("list-1")));
        assert!(!key.starts_with(&key_prefix("list-10")));
    }

    #[test]
    fn test_prefix_upper_bound_excludes_longer_ids() {
        let bound = prefix_upper_bound(&key_prefix("list-1")).unwrap();
        assert_eq!(bound, "list-1 ");
        assert!(composite_key("list-1", "zzz").as_str() < bound.as_str());
        assert!(composite_key("list-10", "a").as_str() > bound.as_str());
        assert!(prefix_upper_bound("").is_none());
    }
}
