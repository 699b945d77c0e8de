//! Reservation lifecycle under single-writer transactions.

use std::collections::HashMap;
use std::sync::Arc;

use giftlist_storage::run_read;
use giftlist_traits::{AuditEvent, AuditEventKind, AuditSink};
use serde_json::json;
use tracing::info;

use super::projector::VisibilityProjector;
use crate::error::{CoreError, RESERVE_CONFLICT, Result, ValidationError, WRITE_CONFLICT};
use crate::models::{Action, CancelTarget, Credential, Reservation, ReservationView, Resource};
use crate::permission::DecisionCache;
use crate::storage::Records;
use crate::txn::{GuardedWriter, authorize};

/// Creates and removes reservations. No other component writes the
/// reservation tables outside of cascading deletes.
#[derive(Clone)]
pub struct ReservationCoordinator {
    writer: GuardedWriter,
    audit: Arc<dyn AuditSink>,
}

impl ReservationCoordinator {
    pub(crate) fn new(writer: GuardedWriter, audit: Arc<dyn AuditSink>) -> Self {
        Self { writer, audit }
    }

    pub async fn reserve(&self, wish_id: &str, actor_id: &str) -> Result<Reservation> {
        self.reserve_with_credential(wish_id, actor_id, None).await
    }

    /// Reserve one unit of a wish, presenting a list password if the wish is
    /// only reachable through a password-protected list.
    pub async fn reserve_with_credential(
        &self,
        wish_id: &str,
        actor_id: &str,
        credential: Option<&Credential>,
    ) -> Result<Reservation> {
        let wish_id = wish_id.to_string();
        let actor = actor_id.to_string();
        let credential = credential.cloned();

        let reservation = self
            .writer
            .write(RESERVE_CONFLICT, move |txn, policy| {
                let records = Records::new(txn);
                let Some(wish) = records.wish(&wish_id)? else {
                    return Err(CoreError::NotFound);
                };
                if wish.is_owner(&actor) {
                    return Err(ValidationError::SelfReservation.into());
                }

                authorize(
                    policy,
                    txn,
                    Some(&actor),
                    Action::Reserve,
                    &Resource::wish(&wish.id),
                    credential.as_ref(),
                )?;

                let live = records.wish_reservations(&wish.id)?;
                if live.iter().any(|existing| existing.reserver_id == actor) {
                    return Err(ValidationError::AlreadyReserved.into());
                }
                if live.len() >= wish.quantity as usize {
                    return Err(ValidationError::FullyReserved.into());
                }

                let reservation = Reservation::new(&wish.id, &actor);
                records.insert_reservation(&reservation)?;
                Ok(reservation)
            })
            .await?;

        info!(
            reservation_id = %reservation.id,
            wish_id = %reservation.wish_id,
            "Reservation created"
        );
        self.audit.emit(
            AuditEvent::new(
                AuditEventKind::ReservationCreated,
                Some(&reservation.reserver_id),
                &reservation.id,
            )
            .with_details(json!({ "wish_id": reservation.wish_id })),
        );
        Ok(reservation)
    }

    /// Cancel a reservation. Only the reserver, or an active system admin,
    /// may do this.
    pub async fn cancel(&self, target: CancelTarget, actor_id: &str) -> Result<()> {
        let actor = actor_id.to_string();

        let removed = self
            .writer
            .write(WRITE_CONFLICT, move |txn, policy| {
                let records = Records::new(txn);
                let reservation = match &target {
                    CancelTarget::Reservation(id) => records.reservation(id)?,
                    CancelTarget::Wish(wish_id) => records
                        .wish_reservations(wish_id)?
                        .into_iter()
                        .find(|reservation| reservation.reserver_id == actor),
                };
                let Some(reservation) = reservation else {
                    return Err(CoreError::NotFound);
                };

                authorize(
                    policy,
                    txn,
                    Some(&actor),
                    Action::Delete,
                    &Resource::reservation(&reservation.id),
                    None,
                )?;

                records.remove_reservation(&reservation)?;
                Ok(reservation)
            })
            .await?;

        info!(
            reservation_id = %removed.id,
            wish_id = %removed.wish_id,
            "Reservation cancelled"
        );
        self.audit.emit(
            AuditEvent::new(
                AuditEventKind::ReservationCancelled,
                Some(actor_id),
                &removed.id,
            )
            .with_details(json!({ "wish_id": removed.wish_id })),
        );
        Ok(())
    }

    /// Reservation state of each wish the viewer may see.
    ///
    /// Missing and hidden wishes are left out of the map.
    pub async fn status_for(
        &self,
        wish_ids: &[String],
        viewer: Option<&str>,
        credential: Option<&Credential>,
    ) -> Result<HashMap<String, ReservationView>> {
        let wish_ids = wish_ids.to_vec();
        let viewer = viewer.map(str::to_string);
        let credential = credential.cloned();
        let policy = self.writer.policy().clone();

        let views = run_read(self.writer.db(), move |txn| {
            let records = Records::new(txn);
            let mut cache = DecisionCache::default();
            let mut views = HashMap::with_capacity(wish_ids.len());

            for wish_id in wish_ids {
                let Some(wish) = records.wish(&wish_id)? else {
                    continue;
                };
                let decision = policy.decide_cached(
                    txn,
                    viewer.as_deref(),
                    Action::View,
                    &Resource::wish(&wish.id),
                    credential.as_ref(),
                    &mut cache,
                )?;
                if !decision.allowed {
                    continue;
                }

                let reservations = records.wish_reservations(&wish.id)?;
                let view = VisibilityProjector::project(&wish, &reservations, viewer.as_deref());
                views.insert(wish.id, view);
            }
            Ok(views)
        })
        .await?;

        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DenialReason, Visibility};
    use crate::testkit::create_test_core;

    #[tokio::test]
    async fn test_reserve_then_already_reserved() {
        let (core, audit) = create_test_core();
        let list = core.lists.create_list("owner", Visibility::Public, None).await.unwrap();
        let wish = core.wishes.create_wish("owner", "Teapot", 2).await.unwrap();
        core.lists.add_wish("owner", &list.id, &wish.id).await.unwrap();

        let reservation = core.reservations.reserve(&wish.id, "aunt").await.unwrap();
        assert_eq!(reservation.reserver_id, "aunt");
        assert!(audit.kinds().contains(&AuditEventKind::ReservationCreated));

        let err = core.reservations.reserve(&wish.id, "aunt").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::AlreadyReserved)));
    }

    #[tokio::test]
    async fn test_quantity_is_respected() {
        let (core, _audit) = create_test_core();
        let list = core.lists.create_list("owner", Visibility::Public, None).await.unwrap();
        let wish = core.wishes.create_wish("owner", "Mug", 1).await.unwrap();
        core.lists.add_wish("owner", &list.id, &wish.id).await.unwrap();

        core.reservations.reserve(&wish.id, "aunt").await.unwrap();
        let err = core.reservations.reserve(&wish.id, "uncle").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::FullyReserved)));
    }

    #[tokio::test]
    async fn test_hidden_wish_does_not_leak_reservation_state() {
        let (core, _audit) = create_test_core();
        let list = core.lists.create_list("owner", Visibility::Private, None).await.unwrap();
        let wish = core.wishes.create_wish("owner", "Mug", 1).await.unwrap();
        core.lists.add_wish("owner", &list.id, &wish.id).await.unwrap();
        core.lists.add_co_manager("owner", &list.id, "helper").await.unwrap();

        core.reservations.reserve(&wish.id, "helper").await.unwrap();
        let err = core.reservations.reserve(&wish.id, "stranger").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let (core, audit) = create_test_core();
        let list = core.lists.create_list("owner", Visibility::Public, None).await.unwrap();
        let wish = core.wishes.create_wish("owner", "Mug", 1).await.unwrap();
        core.lists.add_wish("owner", &list.id, &wish.id).await.unwrap();
        let reservation = core.reservations.reserve(&wish.id, "aunt").await.unwrap();

        let err = core
            .reservations
            .cancel(CancelTarget::Reservation(reservation.id.clone()), "uncle")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Forbidden(DenialReason::OnlyReserverMayCancel)
        ));

        let err = core
            .reservations
            .cancel(CancelTarget::Reservation(reservation.id.clone()), "owner")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound));

        core.reservations
            .cancel(CancelTarget::Wish(wish.id.clone()), "aunt")
            .await
            .unwrap();
        assert!(audit.kinds().contains(&AuditEventKind::ReservationCancelled));

        let err = core
            .reservations
            .cancel(CancelTarget::Wish(wish.id.clone()), "aunt")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound));

        core.reservations.reserve(&wish.id, "uncle").await.unwrap();
    }

    #[tokio::test]
    async fn test_status_for_omits_missing_and_hidden() {
        let (core, _audit) = create_test_core();
        let public = core.lists.create_list("owner", Visibility::Public, None).await.unwrap();
        let private = core.lists.create_list("owner", Visibility::Private, None).await.unwrap();
        let shown = core.wishes.create_wish("owner", "Book", 1).await.unwrap();
        let hidden = core.wishes.create_wish("owner", "Lamp", 1).await.unwrap();
        core.lists.add_wish("owner", &public.id, &shown.id).await.unwrap();
        core.lists.add_wish("owner", &private.id, &hidden.id).await.unwrap();
        core.reservations.reserve(&shown.id, "aunt").await.unwrap();

        let ids = vec![shown.id.clone(), hidden.id.clone(), "missing".to_string()];
        let views = core.reservations.status_for(&ids, Some("uncle"), None).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[&shown.id].is_reserved());
        assert!(!views[&shown.id].can_unreserve());

        let owner_views = core.reservations.status_for(&ids, Some("owner"), None).await.unwrap();
        assert_eq!(owner_views.len(), 2);
        assert!(!owner_views[&shown.id].is_reserved());
    }
}
