//! Storage layer with typed wrappers around giftlist-storage.
//!
//! `Records` turns the byte-level `Snapshot` surface into typed reads and
//! writes. It borrows whatever transaction the caller holds, so the same code
//! serves plain permission checks and in-transaction re-validation.

pub mod account;

use anyhow::Result;
use giftlist_storage::tables::{
    ACCOUNTS, GROUP_MEMBERS, GROUPS, LIST_CO_MANAGERS, LIST_GROUP_SHARES, LIST_WISHES, LISTS,
    RESERVATIONS, RecordTable, USER_GROUPS, WISH_LISTS, WISH_RESERVATIONS, WISHES, composite_key,
    key_prefix,
};
use giftlist_storage::{Snapshot, SnapshotMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{
    Account, CoManager, GiftList, Group, GroupMember, GroupShare, Reservation, Wish,
    WishMembership,
};

pub use account::AccountStore;

/// Typed view over an open transaction.
pub struct Records<'a, S: ?Sized> {
    snap: &'a S,
}

impl<'a, S: ?Sized> Records<'a, S> {
    pub fn new(snap: &'a S) -> Self {
        Self { snap }
    }
}

impl<S: Snapshot + ?Sized> Records<'_, S> {
    fn get<T: DeserializeOwned>(&self, table: RecordTable, key: &str) -> Result<Option<T>> {
        match self.snap.read(table, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, table: RecordTable, left_id: &str) -> Result<Vec<T>> {
        let rows = self.snap.scan_prefix(table, &key_prefix(left_id))?;
        let mut items = Vec::with_capacity(rows.len());
        for (_, bytes) in rows {
            items.push(serde_json::from_slice(&bytes)?);
        }
        Ok(items)
    }

    pub fn account(&self, user_id: &str) -> Result<Option<Account>> {
        self.get(ACCOUNTS, user_id)
    }

    pub fn list(&self, list_id: &str) -> Result<Option<GiftList>> {
        self.get(LISTS, list_id)
    }

    pub fn co_managers(&self, list_id: &str) -> Result<Vec<CoManager>> {
        let rows: Vec<CoManager> = self.scan(LIST_CO_MANAGERS, list_id)?;
        Ok(rows.into_iter().filter(|row| row.list_id == list_id).collect())
    }

    pub fn group_shares(&self, list_id: &str) -> Result<Vec<GroupShare>> {
        let rows: Vec<GroupShare> = self.scan(LIST_GROUP_SHARES, list_id)?;
        Ok(rows.into_iter().filter(|row| row.list_id == list_id).collect())
    }

    pub fn list_wish_ids(&self, list_id: &str) -> Result<Vec<String>> {
        let rows: Vec<WishMembership> = self.scan(LIST_WISHES, list_id)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.list_id == list_id)
            .map(|row| row.wish_id)
            .collect())
    }

    pub fn wish(&self, wish_id: &str) -> Result<Option<Wish>> {
        self.get(WISHES, wish_id)
    }

    pub fn wish_list_ids(&self, wish_id: &str) -> Result<Vec<String>> {
        let rows: Vec<WishMembership> = self.scan(WISH_LISTS, wish_id)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.wish_id == wish_id)
            .map(|row| row.list_id)
            .collect())
    }

    pub fn group(&self, group_id: &str) -> Result<Option<Group>> {
        self.get(GROUPS, group_id)
    }

    pub fn group_member(&self, group_id: &str, user_id: &str) -> Result<Option<GroupMember>> {
        self.get(GROUP_MEMBERS, &composite_key(group_id, user_id))
    }

    pub fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let rows: Vec<GroupMember> = self.scan(GROUP_MEMBERS, group_id)?;
        Ok(rows.into_iter().filter(|row| row.group_id == group_id).collect())
    }

    pub fn user_group_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<GroupMember> = self.scan(USER_GROUPS, user_id)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.group_id)
            .collect())
    }

    pub fn reservation(&self, reservation_id: &str) -> Result<Option<Reservation>> {
        self.get(RESERVATIONS, reservation_id)
    }

    pub fn wish_reservations(&self, wish_id: &str) -> Result<Vec<Reservation>> {
        let rows: Vec<Reservation> = self.scan(WISH_RESERVATIONS, wish_id)?;
        Ok(rows.into_iter().filter(|row| row.wish_id == wish_id).collect())
    }
}

impl<S: SnapshotMut + ?Sized> Records<'_, S> {
    fn put<T: Serialize>(&self, table: RecordTable, key: &str, record: &T) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.snap.write(table, key, &bytes)
    }

    pub fn put_account(&self, account: &Account) -> Result<()> {
        self.put(ACCOUNTS, &account.id, account)
    }

    pub fn put_list(&self, list: &GiftList) -> Result<()> {
        self.put(LISTS, &list.id, list)
    }

    pub fn remove_list(&self, list_id: &str) -> Result<bool> {
        self.snap.remove(LISTS, list_id)
    }

    pub fn put_co_manager(&self, row: &CoManager) -> Result<()> {
        self.put(LIST_CO_MANAGERS, &composite_key(&row.list_id, &row.user_id), row)
    }

    pub fn remove_co_manager(&self, list_id: &str, user_id: &str) -> Result<bool> {
        self.snap
            .remove(LIST_CO_MANAGERS, &composite_key(list_id, user_id))
    }

    pub fn put_group_share(&self, row: &GroupShare) -> Result<()> {
        self.put(
            LIST_GROUP_SHARES,
            &composite_key(&row.list_id, &row.group_id),
            row,
        )
    }

    pub fn remove_group_share(&self, list_id: &str, group_id: &str) -> Result<bool> {
        self.snap
            .remove(LIST_GROUP_SHARES, &composite_key(list_id, group_id))
    }

    pub fn put_wish(&self, wish: &Wish) -> Result<()> {
        self.put(WISHES, &wish.id, wish)
    }

    pub fn remove_wish(&self, wish_id: &str) -> Result<bool> {
        self.snap.remove(WISHES, wish_id)
    }

    /// Write both directions of a wish/list membership.
    pub fn put_membership(&self, row: &WishMembership) -> Result<()> {
        self.put(WISH_LISTS, &composite_key(&row.wish_id, &row.list_id), row)?;
        self.put(LIST_WISHES, &composite_key(&row.list_id, &row.wish_id), row)
    }

    pub fn remove_membership(&self, wish_id: &str, list_id: &str) -> Result<bool> {
        let existed = self
            .snap
            .remove(WISH_LISTS, &composite_key(wish_id, list_id))?;
        self.snap
            .remove(LIST_WISHES, &composite_key(list_id, wish_id))?;
        Ok(existed)
    }

    pub fn put_group(&self, group: &Group) -> Result<()> {
        self.put(GROUPS, &group.id, group)
    }

    /// Write a member row and its reverse index.
    pub fn put_group_member(&self, member: &GroupMember) -> Result<()> {
        self.put(
            GROUP_MEMBERS,
            &composite_key(&member.group_id, &member.user_id),
            member,
        )?;
        self.put(
            USER_GROUPS,
            &composite_key(&member.user_id, &member.group_id),
            member,
        )
    }

    pub fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let existed = self
            .snap
            .remove(GROUP_MEMBERS, &composite_key(group_id, user_id))?;
        self.snap
            .remove(USER_GROUPS, &composite_key(user_id, group_id))?;
        Ok(existed)
    }

    /// Write a reservation row and its per-wish index entry.
    pub fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        self.put(RESERVATIONS, &reservation.id, reservation)?;
        self.put(
            WISH_RESERVATIONS,
            &composite_key(&reservation.wish_id, &reservation.id),
            reservation,
        )
    }

    pub fn remove_reservation(&self, reservation: &Reservation) -> Result<bool> {
        let existed = self.snap.remove(RESERVATIONS, &reservation.id)?;
        self.snap.remove(
            WISH_RESERVATIONS,
            &composite_key(&reservation.wish_id, &reservation.id),
        )?;
        Ok(existed)
    }

    /// Remove every reservation on a wish, returns how many were removed.
    pub fn clear_wish_reservations(&self, wish_id: &str) -> Result<usize> {
        let reservations = self.wish_reservations(wish_id)?;
        for reservation in &reservations {
            self.remove_reservation(reservation)?;
        }
        Ok(reservations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupRole, Visibility};
    use giftlist_storage::Storage;
    use redb::ReadableDatabase;

    #[test]
    fn test_relations_roundtrip_inside_one_transaction() {
        let storage = Storage::in_memory().unwrap();
        let db = storage.get_db();

        let list = GiftList::new("owner", Visibility::Private, None).unwrap();
        let wish = Wish::new("owner", "Teapot", 1);
        let txn = db.begin_write().unwrap();
        {
            let records = Records::new(&txn);
            records.put_list(&list).unwrap();
            records.put_wish(&wish).unwrap();
            records
                .put_membership(&WishMembership::new(&wish.id, &list.id))
                .unwrap();
            records
                .put_co_manager(&CoManager::new(&list.id, "helper"))
                .unwrap();
            records
                .put_group_member(&GroupMember::new("g-1", "friend", GroupRole::Member))
                .unwrap();
            records
                .insert_reservation(&Reservation::new(&wish.id, "friend"))
                .unwrap();

            assert_eq!(records.wish_list_ids(&wish.id).unwrap(), vec![list.id.clone()]);
            assert_eq!(records.wish_reservations(&wish.id).unwrap().len(), 1);
        }
        txn.commit().unwrap();

        let read_txn = db.begin_read().unwrap();
        let records = Records::new(&read_txn);
        assert_eq!(records.list_wish_ids(&list.id).unwrap(), vec![wish.id.clone()]);
        assert_eq!(records.co_managers(&list.id).unwrap()[0].user_id, "helper");
        assert_eq!(records.user_group_ids("friend").unwrap(), vec!["g-1".to_string()]);
        assert_eq!(records.group_members("g-1").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_wish_reservations_removes_index() {
        let storage = Storage::in_memory().unwrap();
        let db = storage.get_db();
        let txn = db.begin_write().unwrap();
        {
            let records = Records::new(&txn);
            records
                .insert_reservation(&Reservation::new("wish-1", "a"))
                .unwrap();
            records
                .insert_reservation(&Reservation::new("wish-1", "b"))
                .unwrap();
            records
                .insert_reservation(&Reservation::new("wish-2", "c"))
                .unwrap();

            assert_eq!(records.clear_wish_reservations("wish-1").unwrap(), 2);
            assert!(records.wish_reservations("wish-1").unwrap().is_empty());
            assert_eq!(records.wish_reservations("wish-2").unwrap().len(), 1);
        }
        txn.commit().unwrap();
    }
}
