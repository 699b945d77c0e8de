//! Synchronous access decisions over a storage snapshot.
//!
//! `Policy` never sleeps and never opens its own transaction: the caller hands
//! it whatever snapshot it holds. `PermissionEngine` wraps it with a read
//! snapshot and the denial floor; the reservation coordinator calls it inside
//! its write transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use giftlist_storage::Snapshot;
use giftlist_traits::PasswordVerifier;
use tracing::debug;

use crate::models::{
    Action, Credential, DenialReason, GiftList, GroupRole, PermissionResult, Resource, Visibility,
    Wish,
};
use crate::storage::Records;

/// Per-call memo of list decisions, so a batch of wishes sharing a list
/// verifies the list password once.
#[derive(Debug, Default)]
pub struct DecisionCache {
    lists: HashMap<(String, Action), PermissionResult>,
}

/// List record plus the co-manager set, read together.
struct ListAccess {
    list: GiftList,
    co_managers: HashSet<String>,
}

#[derive(Clone)]
pub struct Policy {
    verifier: Arc<dyn PasswordVerifier>,
    anonymous_reservations: bool,
}

fn allow() -> PermissionResult {
    PermissionResult::allow()
}

fn deny(reason: DenialReason) -> PermissionResult {
    PermissionResult::deny(reason)
}

fn not_found() -> PermissionResult {
    PermissionResult::not_found()
}

/// Rank of a denial when several lists answer for one wish.
fn informativeness(result: &PermissionResult) -> u8 {
    match result.reason {
        Some(DenialReason::AuthenticationRequired) => 2,
        Some(DenialReason::PasswordRequired) => 1,
        _ => 0,
    }
}

impl Policy {
    pub fn new(verifier: Arc<dyn PasswordVerifier>, anonymous_reservations: bool) -> Self {
        Self {
            verifier,
            anonymous_reservations,
        }
    }

    pub fn verifier(&self) -> &Arc<dyn PasswordVerifier> {
        &self.verifier
    }

    /// Decide whether `actor` may perform `action` on `resource`.
    ///
    /// `Err` means storage failed; a denial is always `Ok`.
    pub fn decide<S: Snapshot + ?Sized>(
        &self,
        snap: &S,
        actor: Option<&str>,
        action: Action,
        resource: &Resource,
        credential: Option<&Credential>,
    ) -> Result<PermissionResult> {
        self.decide_cached(
            snap,
            actor,
            action,
            resource,
            credential,
            &mut DecisionCache::default(),
        )
    }

    /// `decide` with a caller-owned cache shared across several resources.
    pub fn decide_cached<S: Snapshot + ?Sized>(
        &self,
        snap: &S,
        actor: Option<&str>,
        action: Action,
        resource: &Resource,
        credential: Option<&Credential>,
        cache: &mut DecisionCache,
    ) -> Result<PermissionResult> {
        let records = Records::new(snap);

        if let Some(actor_id) = actor
            && let Some(account) = records.account(actor_id)?
        {
            if account.is_active_admin() {
                return Ok(allow());
            }
            if account.is_suspended() {
                return Ok(deny(DenialReason::AccountSuspended));
            }
        }

        let result = match resource {
            Resource::List(id) => self.decide_list(&records, actor, action, id, credential)?,
            Resource::Wish(id) => {
                self.decide_wish(&records, actor, action, id, credential, cache)?
            }
            Resource::Group(id) => self.decide_group(&records, actor, action, id)?,
            Resource::Reservation(id) => {
                self.decide_reservation(&records, actor, action, id, credential, cache)?
            }
        };

        debug!(
            resource = resource.kind(),
            resource_id = resource.id(),
            action = ?action,
            allowed = result.allowed,
            reason = result.reason.map(|r| r.as_str()).unwrap_or("-"),
            "Permission decided"
        );
        Ok(result)
    }

    /// Run the verifier against an empty hash so that a request carrying a
    /// credential costs the same on every denial path.
    fn burn_verification(&self, credential: Option<&Credential>) {
        if let Some(credential) = credential {
            let _ = self.verifier.verify_password(credential.expose(), "");
        }
    }

    fn load_list_access<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        list_id: &str,
    ) -> Result<Option<ListAccess>> {
        let Some(list) = records.list(list_id)? else {
            return Ok(None);
        };
        let co_managers = records
            .co_managers(list_id)?
            .into_iter()
            .map(|row| row.user_id)
            .collect();
        Ok(Some(ListAccess { list, co_managers }))
    }

    fn in_shared_group<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        list_id: &str,
        actor: Option<&str>,
    ) -> Result<bool> {
        let Some(actor_id) = actor else {
            return Ok(false);
        };
        let shared: HashSet<String> = records
            .group_shares(list_id)?
            .into_iter()
            .map(|row| row.group_id)
            .collect();
        if shared.is_empty() {
            return Ok(false);
        }
        Ok(records
            .user_group_ids(actor_id)?
            .iter()
            .any(|group_id| shared.contains(group_id)))
    }

    fn view_by_visibility(
        &self,
        list: &GiftList,
        credential: Option<&Credential>,
    ) -> PermissionResult {
        match list.visibility {
            Visibility::Public => allow(),
            Visibility::Password => match credential {
                None => deny(DenialReason::PasswordRequired),
                Some(credential) => {
                    let hash = list.password_hash.as_deref().unwrap_or("");
                    if self.verifier.verify_password(credential.expose(), hash) {
                        allow()
                    } else {
                        not_found()
                    }
                }
            },
            Visibility::Private => {
                self.burn_verification(credential);
                not_found()
            }
        }
    }

    fn decide_list<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        actor: Option<&str>,
        action: Action,
        list_id: &str,
        credential: Option<&Credential>,
    ) -> Result<PermissionResult> {
        let access = self.load_list_access(records, list_id)?;
        let in_group = self.in_shared_group(records, list_id, actor)?;

        let Some(ListAccess { list, co_managers }) = access else {
            self.burn_verification(credential);
            return Ok(not_found());
        };

        if actor.is_some_and(|actor_id| list.is_owner(actor_id)) {
            return Ok(allow());
        }

        let is_co_manager = actor.is_some_and(|actor_id| co_managers.contains(actor_id));
        if is_co_manager {
            match action {
                Action::View | Action::Edit | Action::Share => return Ok(allow()),
                Action::Delete => return Ok(deny(DenialReason::OnlyOwnerMayDelete)),
                Action::Admin => return Ok(deny(DenialReason::OnlyOwnerMayManageCoManagers)),
                Action::Invite => return Ok(deny(DenialReason::OnlyOwnerMayInvite)),
                Action::Reserve => {}
            }
        }

        let view = if is_co_manager || in_group {
            allow()
        } else {
            self.view_by_visibility(&list, credential)
        };

        Ok(match action {
            Action::View => view,
            Action::Reserve if !view.allowed => view,
            Action::Reserve if actor.is_none() && !self.anonymous_reservations => {
                deny(DenialReason::AuthenticationRequired)
            }
            Action::Reserve => allow(),
            Action::Edit | Action::Delete | Action::Admin | Action::Share | Action::Invite => {
                not_found()
            }
        })
    }

    /// Best answer any containing list gives for `list_action`.
    ///
    /// The credential is verified at most once per decision: after the first
    /// denial it produced, remaining lists are judged as if it were wrong, so
    /// the cost does not grow with the number of password lists.
    fn wish_access<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        actor: Option<&str>,
        list_action: Action,
        wish: &Wish,
        credential: Option<&Credential>,
        cache: &mut DecisionCache,
    ) -> Result<PermissionResult> {
        let list_ids = records.wish_list_ids(&wish.id)?;
        if list_ids.is_empty() {
            self.burn_verification(credential);
            return Ok(not_found());
        }

        let mut best = not_found();
        let mut credential_spent = false;
        for list_id in list_ids {
            let key = (list_id, list_action);
            let result = match cache.lists.get(&key) {
                Some(result) => *result,
                None => {
                    let offered = if credential_spent { None } else { credential };
                    let mut result =
                        self.decide_list(records, actor, list_action, &key.0, offered)?;
                    if credential_spent
                        && result.denial_reason() == Some(DenialReason::PasswordRequired)
                    {
                        result = not_found();
                    }
                    if offered.is_some() && !result.allowed {
                        credential_spent = true;
                    }
                    cache.lists.insert(key, result);
                    result
                }
            };
            if result.allowed {
                return Ok(result);
            }
            if informativeness(&result) > informativeness(&best) {
                best = result;
            }
        }
        Ok(best)
    }

    fn decide_wish<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        actor: Option<&str>,
        action: Action,
        wish_id: &str,
        credential: Option<&Credential>,
        cache: &mut DecisionCache,
    ) -> Result<PermissionResult> {
        let Some(wish) = records.wish(wish_id)? else {
            self.burn_verification(credential);
            return Ok(not_found());
        };

        if actor.is_some_and(|actor_id| wish.is_owner(actor_id)) {
            return Ok(allow());
        }

        let list_action = match action {
            Action::Edit => Action::Edit,
            Action::Share => Action::Share,
            Action::Reserve => Action::Reserve,
            Action::View | Action::Delete | Action::Admin | Action::Invite => Action::View,
        };
        let access = self.wish_access(records, actor, list_action, &wish, credential, cache)?;
        if !access.allowed {
            return Ok(access);
        }

        Ok(match action {
            Action::View | Action::Edit | Action::Share | Action::Reserve => allow(),
            Action::Delete => deny(DenialReason::OnlyOwnerMayDelete),
            Action::Admin | Action::Invite => deny(DenialReason::InsufficientPermissions),
        })
    }

    fn decide_group<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        actor: Option<&str>,
        action: Action,
        group_id: &str,
    ) -> Result<PermissionResult> {
        let group = records.group(group_id)?;
        let member = match actor {
            Some(actor_id) => records.group_member(group_id, actor_id)?,
            None => None,
        };

        let (Some(_), Some(member)) = (group, member) else {
            return Ok(not_found());
        };

        // Group roles never extend to the lists shared with the group.
        Ok(match (member.role, action) {
            (_, Action::Reserve) => deny(DenialReason::InsufficientPermissions),
            (GroupRole::Admin, _) => allow(),
            (GroupRole::Member, Action::View) => allow(),
            (GroupRole::Member, _) => deny(DenialReason::InsufficientPermissions),
        })
    }

    fn decide_reservation<S: Snapshot + ?Sized>(
        &self,
        records: &Records<'_, S>,
        actor: Option<&str>,
        action: Action,
        reservation_id: &str,
        credential: Option<&Credential>,
        cache: &mut DecisionCache,
    ) -> Result<PermissionResult> {
        let Some(reservation) = records.reservation(reservation_id)? else {
            return Ok(not_found());
        };
        let Some(actor_id) = actor else {
            return Ok(not_found());
        };

        if reservation.reserver_id == actor_id {
            return Ok(match action {
                Action::View | Action::Delete => allow(),
                _ => deny(DenialReason::InsufficientPermissions),
            });
        }

        let Some(wish) = records.wish(&reservation.wish_id)? else {
            return Ok(not_found());
        };

        // The wish owner must not learn that the reservation exists.
        if wish.is_owner(actor_id) {
            return Ok(not_found());
        }

        let view = self.wish_access(records, actor, Action::View, &wish, credential, cache)?;
        if view.allowed && action == Action::Delete {
            return Ok(deny(DenialReason::OnlyReserverMayCancel));
        }
        Ok(not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Account, CoManager, Group, GroupMember, GroupShare, Reservation, WishMembership,
    };
    use crate::testkit::{fast_verifier, seed};
    use giftlist_storage::Storage;
    use redb::{Database, ReadableDatabase};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingVerifier {
        verifications: AtomicUsize,
    }

    impl CountingVerifier {
        fn take(&self) -> usize {
            self.verifications.swap(0, Ordering::SeqCst)
        }
    }

    impl PasswordVerifier for CountingVerifier {
        fn hash_password(&self, plaintext: &str) -> anyhow::Result<String> {
            fast_verifier().hash_password(plaintext)
        }

        fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            fast_verifier().verify_password(plaintext, hash)
        }
    }

    struct Fixture {
        db: Arc<Database>,
        policy: Policy,
        _storage: Storage,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_anonymous(false)
        }

        fn with_anonymous(anonymous_reservations: bool) -> Self {
            Self::with_verifier(fast_verifier(), anonymous_reservations)
        }

        fn with_verifier(
            verifier: Arc<dyn PasswordVerifier>,
            anonymous_reservations: bool,
        ) -> Self {
            let storage = Storage::in_memory().unwrap();
            Self {
                db: storage.get_db(),
                policy: Policy::new(verifier, anonymous_reservations),
                _storage: storage,
            }
        }

        fn list(&self, visibility: Visibility, password: Option<&str>) -> GiftList {
            let hash = password.map(|p| self.policy.verifier().hash_password(p).unwrap());
            let list = GiftList::new("owner", visibility, hash).unwrap();
            seed(&self.db, |records| records.put_list(&list));
            list
        }

        fn wish_on(&self, lists: &[&GiftList]) -> Wish {
            let wish = Wish::new("owner", "Kettle", 1);
            seed(&self.db, |records| {
                records.put_wish(&wish)?;
                for list in lists {
                    records.put_membership(&WishMembership::new(&wish.id, &list.id))?;
                }
                Ok(())
            });
            wish
        }

        fn decide(
            &self,
            actor: Option<&str>,
            action: Action,
            resource: &Resource,
            credential: Option<&Credential>,
        ) -> PermissionResult {
            let txn = self.db.begin_read().unwrap();
            self.policy
                .decide(&txn, actor, action, resource, credential)
                .unwrap()
        }

        fn reason(
            &self,
            actor: Option<&str>,
            action: Action,
            resource: &Resource,
        ) -> Option<DenialReason> {
            self.decide(actor, action, resource, None).denial_reason()
        }
    }

    #[test]
    fn test_owner_may_do_everything() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Private, None);
        let resource = Resource::list(&list.id);
        for action in [
            Action::View,
            Action::Edit,
            Action::Delete,
            Action::Admin,
            Action::Share,
            Action::Invite,
            Action::Reserve,
        ] {
            assert!(fx.decide(Some("owner"), action, &resource, None).allowed);
        }
    }

    #[test]
    fn test_private_list_looks_absent() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Private, None);
        let existing = Resource::list(&list.id);
        let missing = Resource::list("no-such-list");

        for actor in [None, Some("stranger")] {
            assert_eq!(
                fx.reason(actor, Action::View, &existing),
                fx.reason(actor, Action::View, &missing)
            );
            assert_eq!(
                fx.reason(actor, Action::View, &existing),
                Some(DenialReason::NotFound)
            );
        }
    }

    #[test]
    fn test_public_list_grants_view_only() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Public, None);
        let resource = Resource::list(&list.id);

        assert!(fx.decide(None, Action::View, &resource, None).allowed);
        assert!(fx.decide(Some("stranger"), Action::Reserve, &resource, None).allowed);
        assert_eq!(
            fx.reason(None, Action::Reserve, &resource),
            Some(DenialReason::AuthenticationRequired)
        );
        assert_eq!(
            fx.reason(Some("stranger"), Action::Edit, &resource),
            Some(DenialReason::NotFound)
        );
    }

    #[test]
    fn test_anonymous_reserve_when_enabled() {
        let fx = Fixture::with_anonymous(true);
        let list = fx.list(Visibility::Public, None);
        assert!(fx.decide(None, Action::Reserve, &Resource::list(&list.id), None).allowed);
    }

    #[test]
    fn test_password_list() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Password, Some("swordfish"));
        let resource = Resource::list(&list.id);

        assert_eq!(
            fx.reason(None, Action::View, &resource),
            Some(DenialReason::PasswordRequired)
        );

        let wrong = Credential::password("tuna");
        assert_eq!(
            fx.decide(None, Action::View, &resource, Some(&wrong)).denial_reason(),
            Some(DenialReason::NotFound)
        );

        let right = Credential::password("swordfish");
        assert!(fx.decide(None, Action::View, &resource, Some(&right)).allowed);
        assert!(
            !fx.decide(Some("stranger"), Action::Edit, &resource, Some(&right))
                .allowed
        );
    }

    #[test]
    fn test_co_manager_ceiling() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Private, None);
        seed(&fx.db, |records| records.put_co_manager(&CoManager::new(&list.id, "helper")));
        let resource = Resource::list(&list.id);

        for action in [Action::View, Action::Edit, Action::Share] {
            assert!(fx.decide(Some("helper"), action, &resource, None).allowed);
        }
        assert!(fx.decide(Some("helper"), Action::Reserve, &resource, None).allowed);
        assert_eq!(
            fx.reason(Some("helper"), Action::Delete, &resource),
            Some(DenialReason::OnlyOwnerMayDelete)
        );
        assert_eq!(
            fx.reason(Some("helper"), Action::Admin, &resource),
            Some(DenialReason::OnlyOwnerMayManageCoManagers)
        );
        assert_eq!(
            fx.reason(Some("helper"), Action::Invite, &resource),
            Some(DenialReason::OnlyOwnerMayInvite)
        );
    }

    #[test]
    fn test_group_share_grants_view_not_edit() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Private, None);
        let group = Group::new("Family");
        seed(&fx.db, |records| {
            records.put_group(&group)?;
            records.put_group_member(&GroupMember::new(&group.id, "cousin", GroupRole::Admin))?;
            records.put_group_share(&GroupShare::new(&list.id, &group.id))
        });
        let resource = Resource::list(&list.id);

        assert!(fx.decide(Some("cousin"), Action::View, &resource, None).allowed);
        assert!(fx.decide(Some("cousin"), Action::Reserve, &resource, None).allowed);
        assert_eq!(
            fx.reason(Some("cousin"), Action::Edit, &resource),
            Some(DenialReason::NotFound)
        );
        assert!(
            fx.decide(Some("cousin"), Action::Admin, &Resource::group(&group.id), None)
                .allowed
        );
    }

    #[test]
    fn test_account_gate() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Private, None);
        seed(&fx.db, |records| {
            let mut suspended = Account::new("owner");
            suspended.suspended_at = Some(1);
            records.put_account(&suspended)?;
            records.put_account(&Account::admin("root"))
        });
        let resource = Resource::list(&list.id);

        assert_eq!(
            fx.reason(Some("owner"), Action::View, &resource),
            Some(DenialReason::AccountSuspended)
        );
        assert!(fx.decide(Some("root"), Action::Delete, &resource, None).allowed);
    }

    #[test]
    fn test_suspended_admin_has_no_permissions() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Public, None);
        let wish = fx.wish_on(&[&list]);
        seed(&fx.db, |records| {
            let mut root = Account::admin("root");
            root.suspended_at = Some(1);
            records.put_account(&root)
        });

        for (action, resource) in [
            (Action::View, Resource::list(&list.id)),
            (Action::Reserve, Resource::list(&list.id)),
            (Action::Reserve, Resource::wish(&wish.id)),
            (Action::Delete, Resource::wish(&wish.id)),
        ] {
            assert_eq!(
                fx.reason(Some("root"), action, &resource),
                Some(DenialReason::AccountSuspended)
            );
        }
    }

    #[test]
    fn test_wish_inherits_most_permissive_list() {
        let fx = Fixture::new();
        let private = fx.list(Visibility::Private, None);
        let public = fx.list(Visibility::Public, None);
        let wish = fx.wish_on(&[&private, &public]);
        let resource = Resource::wish(&wish.id);

        assert!(fx.decide(Some("stranger"), Action::View, &resource, None).allowed);
        assert!(fx.decide(Some("stranger"), Action::Reserve, &resource, None).allowed);
        assert_eq!(
            fx.reason(Some("stranger"), Action::Delete, &resource),
            Some(DenialReason::OnlyOwnerMayDelete)
        );
        assert_eq!(
            fx.reason(Some("stranger"), Action::Edit, &resource),
            Some(DenialReason::NotFound)
        );
    }

    #[test]
    fn test_wish_on_password_list_asks_for_password() {
        let fx = Fixture::new();
        let private = fx.list(Visibility::Private, None);
        let locked = fx.list(Visibility::Password, Some("swordfish"));
        let wish = fx.wish_on(&[&private, &locked]);
        let resource = Resource::wish(&wish.id);

        assert_eq!(
            fx.reason(Some("stranger"), Action::View, &resource),
            Some(DenialReason::PasswordRequired)
        );
        let right = Credential::password("swordfish");
        assert!(
            fx.decide(Some("stranger"), Action::Reserve, &resource, Some(&right))
                .allowed
        );
    }

    #[test]
    fn test_reservation_hidden_from_wish_owner() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Public, None);
        let wish = fx.wish_on(&[&list]);
        let reservation = Reservation::new(&wish.id, "aunt");
        seed(&fx.db, |records| records.insert_reservation(&reservation));
        let resource = Resource::reservation(&reservation.id);

        assert!(fx.decide(Some("aunt"), Action::Delete, &resource, None).allowed);
        assert_eq!(
            fx.reason(Some("owner"), Action::View, &resource),
            Some(DenialReason::NotFound)
        );
        assert_eq!(
            fx.reason(Some("owner"), Action::Delete, &resource),
            Some(DenialReason::NotFound)
        );
        assert_eq!(
            fx.reason(Some("uncle"), Action::Delete, &resource),
            Some(DenialReason::OnlyReserverMayCancel)
        );
        assert_eq!(
            fx.reason(Some("uncle"), Action::View, &resource),
            Some(DenialReason::NotFound)
        );
    }

    #[test]
    fn test_decision_cache_reuses_list_answers() {
        let fx = Fixture::new();
        let list = fx.list(Visibility::Public, None);
        let first = fx.wish_on(&[&list]);
        let second = fx.wish_on(&[&list]);
        let txn = fx.db.begin_read().unwrap();
        let mut cache = DecisionCache::default();

        for wish in [&first, &second] {
            let result = fx
                .policy
                .decide_cached(
                    &txn,
                    Some("stranger"),
                    Action::View,
                    &Resource::wish(&wish.id),
                    None,
                    &mut cache,
                )
                .unwrap();
            assert!(result.allowed);
        }
        assert_eq!(cache.lists.len(), 1);
    }

    #[test]
    fn test_wish_on_many_password_lists_verifies_once() {
        let counter = Arc::new(CountingVerifier::default());
        let fx = Fixture::with_verifier(counter.clone(), false);
        let lists: Vec<GiftList> = (0..3)
            .map(|_| fx.list(Visibility::Password, Some("sesame")))
            .collect();
        let wish = fx.wish_on(&lists.iter().collect::<Vec<_>>());
        let resource = Resource::wish(&wish.id);
        counter.take();

        let wrong = Credential::password("open says me");
        let denied = fx.decide(Some("stranger"), Action::View, &resource, Some(&wrong));
        assert_eq!(denied.denial_reason(), Some(DenialReason::NotFound));
        assert_eq!(counter.take(), 1);

        let missing = fx.decide(
            Some("stranger"),
            Action::View,
            &Resource::wish("no-such-wish"),
            Some(&wrong),
        );
        assert_eq!(missing.denial_reason(), Some(DenialReason::NotFound));
        assert_eq!(counter.take(), 1);

        let right = Credential::password("sesame");
        assert!(fx.decide(Some("stranger"), Action::View, &resource, Some(&right)).allowed);
        assert_eq!(counter.take(), 1);
    }
}
