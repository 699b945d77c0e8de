//! List management: visibility, delegation, group sharing and wish placement.

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use giftlist_storage::{ListStorage, run_read};
use giftlist_traits::{AuditEvent, AuditEventKind, AuditSink};
use serde_json::json;
use tracing::{debug, info};

use super::{hash_password, release_if_unlisted};
use crate::error::{CoreError, Result, ValidationError, WRITE_CONFLICT};
use crate::models::{
    Action, CoManager, Credential, GiftList, GroupShare, Resource, Visibility, Wish,
    WishMembership,
};
use crate::permission::PermissionEngine;
use crate::storage::Records;
use crate::txn::{GuardedWriter, authorize};

/// The stored hash never leaves the core.
fn strip_hash(mut list: GiftList) -> GiftList {
    list.password_hash = None;
    list
}

#[derive(Clone)]
pub struct ListService {
    writer: GuardedWriter,
    engine: PermissionEngine,
    lists: ListStorage,
    audit: Arc<dyn AuditSink>,
}

impl ListService {
    pub(crate) fn new(
        writer: GuardedWriter,
        engine: PermissionEngine,
        lists: ListStorage,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            writer,
            engine,
            lists,
            audit,
        }
    }

    /// Hash for a move to `visibility`; only the password tier takes one.
    async fn hash_for(
        &self,
        visibility: Visibility,
        password: Option<&str>,
    ) -> Result<Option<String>> {
        match (visibility, password) {
            (Visibility::Password, Some(password)) if !password.is_empty() => {
                let verifier = self.writer.policy().verifier().clone();
                Ok(Some(hash_password(verifier, password.to_string()).await?))
            }
            (Visibility::Password, _) => Err(ValidationError::PasswordRequired.into()),
            _ => Ok(None),
        }
    }

    pub async fn create_list(
        &self,
        owner_id: &str,
        visibility: Visibility,
        password: Option<&str>,
    ) -> Result<GiftList> {
        let hash = self.hash_for(visibility, password).await?;
        let list = GiftList::new(owner_id, visibility, hash)?;

        let record = list.clone();
        self.writer
            .write(WRITE_CONFLICT, move |txn, _| {
                Records::new(txn).put_list(&record)?;
                Ok(())
            })
            .await?;

        info!(list_id = %list.id, visibility = ?list.visibility, "List created");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::ListCreated, Some(owner_id), &list.id)
                .with_details(json!({ "visibility": list.visibility })),
        );
        Ok(strip_hash(list))
    }

    pub async fn get_list(
        &self,
        actor: Option<&str>,
        list_id: &str,
        credential: Option<&Credential>,
    ) -> Result<GiftList> {
        self.engine
            .require(actor, Action::View, &Resource::list(list_id), credential)
            .await?;

        let id = list_id.to_string();
        let list = run_read(self.writer.db(), move |txn| Records::new(txn).list(&id)).await?;
        list.map(strip_hash).ok_or(CoreError::NotFound)
    }

    /// Move a list to another visibility tier.
    ///
    /// A move to `Password` needs a fresh password and replaces any previous
    /// hash. Leaving a linkable tier keeps the share token.
    pub async fn set_visibility(
        &self,
        actor_id: &str,
        list_id: &str,
        visibility: Visibility,
        password: Option<&str>,
    ) -> Result<GiftList> {
        let hash = self.hash_for(visibility, password).await?;
        let actor = actor_id.to_string();
        let id = list_id.to_string();

        let list = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Edit, &Resource::list(&id), None)?;
                let records = Records::new(txn);
                let mut list = records.list(&id)?.ok_or(CoreError::NotFound)?;
                list.apply_visibility(visibility, hash)?;
                records.put_list(&list)?;
                Ok(list)
            })
            .await?;

        info!(list_id = %list.id, visibility = ?list.visibility, "List visibility changed");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::ListVisibilityChanged, Some(actor_id), &list.id)
                .with_details(json!({ "visibility": list.visibility })),
        );
        Ok(strip_hash(list))
    }

    pub async fn rotate_share_token(&self, actor_id: &str, list_id: &str) -> Result<GiftList> {
        let actor = actor_id.to_string();
        let id = list_id.to_string();

        let list = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Share, &Resource::list(&id), None)?;
                let records = Records::new(txn);
                let mut list = records.list(&id)?.ok_or(CoreError::NotFound)?;
                list.rotate_share_token();
                records.put_list(&list)?;
                Ok(list)
            })
            .await?;

        info!(list_id = %list.id, "Share token rotated");
        self.audit.emit(AuditEvent::new(
            AuditEventKind::ListShareTokenRotated,
            Some(actor_id),
            &list.id,
        ));
        Ok(strip_hash(list))
    }

    /// Resolve a share link to its list ID.
    ///
    /// Unknown tokens and tokens retained by a private list both answer
    /// `NotFound` after the denial floor.
    pub async fn find_by_share_token(&self, token: &str) -> Result<String> {
        let started = Instant::now();
        let lists = self.lists.clone();
        let token = token.to_string();

        let found = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<GiftList>> {
            match lists.find_raw_by_share_token(&token)? {
                Some((_, bytes)) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|err| anyhow!("share token lookup failed: {err}"))??;

        match found {
            Some(list) if list.visibility.is_linkable() => Ok(list.id),
            _ => {
                self.writer.floor().pad(started).await;
                debug!("Share token did not resolve");
                Err(CoreError::NotFound)
            }
        }
    }

    pub async fn add_co_manager(
        &self,
        actor_id: &str,
        list_id: &str,
        user_id: &str,
    ) -> Result<CoManager> {
        let actor = actor_id.to_string();
        let row = CoManager::new(list_id, user_id);

        let row = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                let resource = Resource::list(&row.list_id);
                authorize(policy, txn, Some(&actor), Action::Admin, &resource, None)?;
                let records = Records::new(txn);
                let list = records.list(&row.list_id)?.ok_or(CoreError::NotFound)?;
                if list.is_owner(&row.user_id) {
                    return Err(ValidationError::OwnerCannotBeCoManager.into());
                }
                records.put_co_manager(&row)?;
                Ok(row)
            })
            .await?;

        info!(list_id = %row.list_id, user_id = %row.user_id, "Co-manager added");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::CoManagerAdded, Some(actor_id), &row.list_id)
                .with_details(json!({ "user_id": row.user_id })),
        );
        Ok(row)
    }

    /// Returns whether the user was a co-manager.
    pub async fn remove_co_manager(
        &self,
        actor_id: &str,
        list_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let actor = actor_id.to_string();
        let id = list_id.to_string();
        let user = user_id.to_string();

        let removed = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Admin, &Resource::list(&id), None)?;
                Ok(Records::new(txn).remove_co_manager(&id, &user)?)
            })
            .await?;

        if removed {
            info!(list_id = %list_id, user_id = %user_id, "Co-manager removed");
            self.audit.emit(
                AuditEvent::new(AuditEventKind::CoManagerRemoved, Some(actor_id), list_id)
                    .with_details(json!({ "user_id": user_id })),
            );
        }
        Ok(removed)
    }

    pub async fn co_managers(&self, actor_id: &str, list_id: &str) -> Result<Vec<CoManager>> {
        self.engine
            .require(Some(actor_id), Action::Edit, &Resource::list(list_id), None)
            .await?;

        let id = list_id.to_string();
        Ok(run_read(self.writer.db(), move |txn| Records::new(txn).co_managers(&id)).await?)
    }

    /// Make a list visible to every member of a group the actor belongs to.
    pub async fn share_with_group(
        &self,
        actor_id: &str,
        list_id: &str,
        group_id: &str,
    ) -> Result<GroupShare> {
        let actor = actor_id.to_string();
        let row = GroupShare::new(list_id, group_id);

        let row = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                let list = Resource::list(&row.list_id);
                authorize(policy, txn, Some(&actor), Action::Share, &list, None)?;
                let group = Resource::group(&row.group_id);
                authorize(policy, txn, Some(&actor), Action::View, &group, None)?;
                Records::new(txn).put_group_share(&row)?;
                Ok(row)
            })
            .await?;

        info!(list_id = %row.list_id, group_id = %row.group_id, "List shared with group");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::ListSharedWithGroup, Some(actor_id), &row.list_id)
                .with_details(json!({ "group_id": row.group_id })),
        );
        Ok(row)
    }

    pub async fn unshare_with_group(
        &self,
        actor_id: &str,
        list_id: &str,
        group_id: &str,
    ) -> Result<bool> {
        let actor = actor_id.to_string();
        let id = list_id.to_string();
        let group = group_id.to_string();

        let removed = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Share, &Resource::list(&id), None)?;
                Ok(Records::new(txn).remove_group_share(&id, &group)?)
            })
            .await?;

        if removed {
            info!(list_id = %list_id, group_id = %group_id, "List unshared from group");
            self.audit.emit(
                AuditEvent::new(AuditEventKind::ListUnsharedWithGroup, Some(actor_id), list_id)
                    .with_details(json!({ "group_id": group_id })),
            );
        }
        Ok(removed)
    }

    /// Put a wish on a list. The actor needs edit rights on both.
    pub async fn add_wish(&self, actor_id: &str, list_id: &str, wish_id: &str) -> Result<()> {
        let actor = actor_id.to_string();
        let row = WishMembership::new(wish_id, list_id);

        self.writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                let list = Resource::list(&row.list_id);
                authorize(policy, txn, Some(&actor), Action::Edit, &list, None)?;
                let wish = Resource::wish(&row.wish_id);
                authorize(policy, txn, Some(&actor), Action::Edit, &wish, None)?;
                Records::new(txn).put_membership(&row)?;
                Ok(())
            })
            .await?;

        debug!(list_id = %list_id, wish_id = %wish_id, "Wish added to list");
        Ok(())
    }

    /// Take a wish off a list. Returns whether it was on the list.
    pub async fn remove_wish(&self, actor_id: &str, list_id: &str, wish_id: &str) -> Result<bool> {
        let actor = actor_id.to_string();
        let id = list_id.to_string();
        let wish = wish_id.to_string();

        let removed = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Edit, &Resource::list(&id), None)?;
                let records = Records::new(txn);
                let removed = records.remove_membership(&wish, &id)?;
                if removed {
                    release_if_unlisted(&records, &wish)?;
                }
                Ok(removed)
            })
            .await?;

        debug!(list_id = %list_id, wish_id = %wish_id, removed, "Wish removed from list");
        Ok(removed)
    }

    pub async fn list_wishes(
        &self,
        actor: Option<&str>,
        list_id: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<Wish>> {
        self.engine
            .require(actor, Action::View, &Resource::list(list_id), credential)
            .await?;

        let id = list_id.to_string();
        let wishes = run_read(self.writer.db(), move |txn| {
            let records = Records::new(txn);
            let mut wishes = Vec::new();
            for wish_id in records.list_wish_ids(&id)? {
                if let Some(wish) = records.wish(&wish_id)? {
                    wishes.push(wish);
                }
            }
            Ok(wishes)
        })
        .await?;
        Ok(wishes)
    }

    /// Delete a list together with its delegation, shares and memberships.
    ///
    /// Wishes left on no list lose their reservations in the same
    /// transaction.
    pub async fn delete_list(&self, actor_id: &str, list_id: &str) -> Result<()> {
        let actor = actor_id.to_string();
        let id = list_id.to_string();

        let released = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Delete, &Resource::list(&id), None)?;
                let records = Records::new(txn);

                for row in records.co_managers(&id)? {
                    records.remove_co_manager(&id, &row.user_id)?;
                }
                for row in records.group_shares(&id)? {
                    records.remove_group_share(&id, &row.group_id)?;
                }

                let mut released = 0;
                for wish_id in records.list_wish_ids(&id)? {
                    records.remove_membership(&wish_id, &id)?;
                    released += release_if_unlisted(&records, &wish_id)?;
                }

                if !records.remove_list(&id)? {
                    return Err(CoreError::NotFound);
                }
                Ok(released)
            })
            .await?;

        info!(list_id = %list_id, released_reservations = released, "List deleted");
        self.audit.emit(AuditEvent::new(
            AuditEventKind::ListDeleted,
            Some(actor_id),
            list_id,
        ));
        Ok(())
    }
}
