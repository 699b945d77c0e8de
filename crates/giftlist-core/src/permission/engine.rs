//! Async front door for permission checks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use giftlist_storage::run_read;
use redb::Database;
use tracing::debug;

use super::policy::Policy;
use super::timing::DenialFloor;
use crate::error::{CoreError, Result};
use crate::models::{Action, Credential, PermissionResult, Resource};

/// Answers `can` questions against a fresh read snapshot.
///
/// Every denial, whatever its reason, takes at least the denial floor.
#[derive(Clone)]
pub struct PermissionEngine {
    db: Arc<Database>,
    policy: Policy,
    floor: DenialFloor,
}

impl PermissionEngine {
    pub fn new(db: Arc<Database>, policy: Policy, floor: DenialFloor) -> Self {
        Self { db, policy, floor }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn denial_floor(&self) -> Duration {
        self.floor.duration()
    }

    pub async fn can(
        &self,
        actor: Option<&str>,
        action: Action,
        resource: &Resource,
        credential: Option<&Credential>,
    ) -> Result<PermissionResult> {
        let started = Instant::now();
        let policy = self.policy.clone();
        let actor_id = actor.map(str::to_string);
        let target = resource.clone();
        let credential = credential.cloned();

        let result = run_read(self.db.clone(), move |txn| {
            policy.decide(txn, actor_id.as_deref(), action, &target, credential.as_ref())
        })
        .await?;

        if !result.allowed {
            self.floor.pad(started).await;
            debug!(
                resource = resource.kind(),
                action = ?action,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Denial padded"
            );
        }
        Ok(result)
    }

    /// `can`, with a denial turned into `NotFound` or `Forbidden`.
    pub async fn require(
        &self,
        actor: Option<&str>,
        action: Action,
        resource: &Resource,
        credential: Option<&Credential>,
    ) -> Result<()> {
        let result = self.can(actor, action, resource, credential).await?;
        match result.denial_reason() {
            None => Ok(()),
            Some(reason) => Err(CoreError::from_denial(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DenialReason, GiftList, Visibility};
    use crate::testkit::{fast_verifier, seed};
    use giftlist_storage::Storage;

    fn engine_with_list(visibility: Visibility) -> (PermissionEngine, String) {
        let storage = Storage::in_memory().unwrap();
        let db = storage.get_db();
        let list = GiftList::new("owner", visibility, None).unwrap();
        let list_id = list.id.clone();
        seed(&db, |records| records.put_list(&list));

        let engine = PermissionEngine::new(
            db,
            Policy::new(fast_verifier(), false),
            DenialFloor::new(Duration::from_millis(40)),
        );
        (engine, list_id)
    }

    #[tokio::test]
    async fn test_denial_is_padded_to_floor() {
        let (engine, list_id) = engine_with_list(Visibility::Private);
        let started = Instant::now();
        let result = engine
            .can(Some("stranger"), Action::View, &Resource::list(&list_id), None)
            .await
            .unwrap();
        assert_eq!(result.denial_reason(), Some(DenialReason::NotFound));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_require_maps_denials() {
        let (engine, list_id) = engine_with_list(Visibility::Public);
        let resource = Resource::list(&list_id);

        engine
            .require(Some("owner"), Action::Delete, &resource, None)
            .await
            .unwrap();
        engine
            .require(None, Action::View, &resource, None)
            .await
            .unwrap();

        let err = engine
            .require(None, Action::Reserve, &resource, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Forbidden(DenialReason::AuthenticationRequired)
        ));

        let err = engine
            .require(Some("stranger"), Action::Edit, &resource, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }
}
