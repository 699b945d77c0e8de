//! Group membership with last-admin protection.

use std::sync::Arc;

use giftlist_storage::{Snapshot, SnapshotMut, run_read};
use giftlist_traits::{AuditEvent, AuditEventKind, AuditSink};
use serde_json::json;
use tracing::info;

use crate::error::{CoreError, Result, ValidationError, WRITE_CONFLICT};
use crate::models::{Action, Group, GroupMember, GroupRole, Resource};
use crate::permission::PermissionEngine;
use crate::storage::Records;
use crate::txn::{GuardedWriter, authorize};

/// Fails when `user_id` is the only admin of the group.
fn ensure_other_admin<S: Snapshot + ?Sized>(
    records: &Records<'_, S>,
    group_id: &str,
    user_id: &str,
) -> Result<()> {
    let members = records.group_members(group_id)?;
    let target_is_admin = members
        .iter()
        .any(|member| member.user_id == user_id && member.is_admin());
    let admins = members.iter().filter(|member| member.is_admin()).count();
    if target_is_admin && admins <= 1 {
        return Err(ValidationError::LastAdmin.into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct GroupService {
    writer: GuardedWriter,
    engine: PermissionEngine,
    audit: Arc<dyn AuditSink>,
}

impl GroupService {
    pub(crate) fn new(
        writer: GuardedWriter,
        engine: PermissionEngine,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            writer,
            engine,
            audit,
        }
    }

    /// Create a group with `creator_id` as its first admin.
    pub async fn create_group(&self, creator_id: &str, name: &str) -> Result<Group> {
        let group = Group::new(name);
        let record = group.clone();
        let admin = GroupMember::new(&group.id, creator_id, GroupRole::Admin);

        self.writer
            .write(WRITE_CONFLICT, move |txn, _| {
                let records = Records::new(txn);
                records.put_group(&record)?;
                records.put_group_member(&admin)?;
                Ok(())
            })
            .await?;

        info!(group_id = %group.id, "Group created");
        self.audit.emit(AuditEvent::new(
            AuditEventKind::GroupCreated,
            Some(creator_id),
            &group.id,
        ));
        Ok(group)
    }

    /// Add a member. An existing member is returned unchanged.
    pub async fn add_member(
        &self,
        actor_id: &str,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> Result<GroupMember> {
        let actor = actor_id.to_string();
        let candidate = GroupMember::new(group_id, user_id, role);

        let (member, added) = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                let group = Resource::group(&candidate.group_id);
                authorize(policy, txn, Some(&actor), Action::Invite, &group, None)?;
                let records = Records::new(txn);
                if let Some(existing) =
                    records.group_member(&candidate.group_id, &candidate.user_id)?
                {
                    return Ok((existing, false));
                }
                records.put_group_member(&candidate)?;
                Ok((candidate, true))
            })
            .await?;

        if added {
            info!(
                group_id = %member.group_id,
                user_id = %member.user_id,
                role = ?member.role,
                "Group member added"
            );
            self.audit.emit(
                AuditEvent::new(AuditEventKind::GroupMemberAdded, Some(actor_id), group_id)
                    .with_details(json!({ "user_id": member.user_id, "role": member.role })),
            );
        }
        Ok(member)
    }

    /// Change a member's role. Demoting the last admin fails.
    pub async fn set_role(
        &self,
        actor_id: &str,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> Result<GroupMember> {
        let actor = actor_id.to_string();
        let id = group_id.to_string();
        let user = user_id.to_string();

        let member = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Admin, &Resource::group(&id), None)?;
                let records = Records::new(txn);
                let mut member = records
                    .group_member(&id, &user)?
                    .ok_or(ValidationError::NotAMember)?;
                if member.role == role {
                    return Ok(member);
                }
                if role == GroupRole::Member {
                    ensure_other_admin(&records, &id, &user)?;
                }
                member.role = role;
                records.put_group_member(&member)?;
                Ok(member)
            })
            .await?;

        info!(group_id = %group_id, user_id = %user_id, role = ?member.role, "Group role changed");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::GroupMemberRoleChanged, Some(actor_id), group_id)
                .with_details(json!({ "user_id": user_id, "role": member.role })),
        );
        Ok(member)
    }

    pub async fn remove_member(&self, actor_id: &str, group_id: &str, user_id: &str) -> Result<()> {
        let actor = actor_id.to_string();
        let id = group_id.to_string();
        let user = user_id.to_string();

        self.writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Admin, &Resource::group(&id), None)?;
                Self::remove_in(&Records::new(txn), &id, &user)
            })
            .await?;

        info!(group_id = %group_id, user_id = %user_id, "Group member removed");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::GroupMemberRemoved, Some(actor_id), group_id)
                .with_details(json!({ "user_id": user_id })),
        );
        Ok(())
    }

    /// Leave a group. The last admin has to hand over first.
    pub async fn leave(&self, actor_id: &str, group_id: &str) -> Result<()> {
        let actor = actor_id.to_string();
        let id = group_id.to_string();

        self.writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::View, &Resource::group(&id), None)?;
                Self::remove_in(&Records::new(txn), &id, &actor)
            })
            .await?;

        info!(group_id = %group_id, user_id = %actor_id, "Group member left");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::GroupMemberRemoved, Some(actor_id), group_id)
                .with_details(json!({ "user_id": actor_id })),
        );
        Ok(())
    }

    fn remove_in<S: SnapshotMut + ?Sized>(
        records: &Records<'_, S>,
        group_id: &str,
        user_id: &str,
    ) -> Result<()> {
        if records.group_member(group_id, user_id)?.is_none() {
            return Err(ValidationError::NotAMember.into());
        }
        ensure_other_admin(records, group_id, user_id)?;
        records.remove_group_member(group_id, user_id)?;
        Ok(())
    }

    pub async fn list_members(&self, actor_id: &str, group_id: &str) -> Result<Vec<GroupMember>> {
        self.engine
            .require(Some(actor_id), Action::View, &Resource::group(group_id), None)
            .await?;

        let id = group_id.to_string();
        let members = run_read(self.writer.db(), move |txn| Records::new(txn).group_members(&id))
            .await?;
        if members.is_empty() {
            return Err(CoreError::NotFound);
        }
        Ok(members)
    }
}
