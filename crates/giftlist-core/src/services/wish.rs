//! Wish lifecycle.

use std::sync::Arc;

use giftlist_storage::run_read;
use giftlist_traits::{AuditEvent, AuditEventKind, AuditSink};
use serde_json::json;
use tracing::info;

use crate::error::{CoreError, Result, ValidationError, WRITE_CONFLICT};
use crate::models::{Action, Credential, Resource, Wish};
use crate::permission::PermissionEngine;
use crate::storage::Records;
use crate::txn::{GuardedWriter, authorize};

#[derive(Clone)]
pub struct WishService {
    writer: GuardedWriter,
    engine: PermissionEngine,
    audit: Arc<dyn AuditSink>,
}

impl WishService {
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

    pub async fn create_wish(&self, owner_id: &str, title: &str, quantity: u32) -> Result<Wish> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity.into());
        }

        let wish = Wish::new(owner_id, title, quantity);
        let record = wish.clone();
        self.writer
            .write(WRITE_CONFLICT, move |txn, _| {
                Records::new(txn).put_wish(&record)?;
                Ok(())
            })
            .await?;

        info!(wish_id = %wish.id, quantity, "Wish created");
        self.audit.emit(
            AuditEvent::new(AuditEventKind::WishCreated, Some(owner_id), &wish.id)
                .with_details(json!({ "quantity": quantity })),
        );
        Ok(wish)
    }

    pub async fn get_wish(
        &self,
        actor: Option<&str>,
        wish_id: &str,
        credential: Option<&Credential>,
    ) -> Result<Wish> {
        self.engine
            .require(actor, Action::View, &Resource::wish(wish_id), credential)
            .await?;

        let id = wish_id.to_string();
        let wish = run_read(self.writer.db(), move |txn| Records::new(txn).wish(&id)).await?;
        wish.ok_or(CoreError::NotFound)
    }

    /// Delete a wish, its list memberships and every reservation on it.
    pub async fn delete_wish(&self, actor_id: &str, wish_id: &str) -> Result<()> {
        let actor = actor_id.to_string();
        let id = wish_id.to_string();

        self.writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                authorize(policy, txn, Some(&actor), Action::Delete, &Resource::wish(&id), None)?;
                let records = Records::new(txn);
                for list_id in records.wish_list_ids(&id)? {
                    records.remove_membership(&id, &list_id)?;
                }
                records.clear_wish_reservations(&id)?;
                if !records.remove_wish(&id)? {
                    return Err(CoreError::NotFound);
                }
                Ok(())
            })
            .await?;

        info!(wish_id = %wish_id, "Wish deleted");
        self.audit.emit(AuditEvent::new(
            AuditEventKind::WishDeleted,
            Some(actor_id),
            wish_id,
        ));
        Ok(())
    }
}
