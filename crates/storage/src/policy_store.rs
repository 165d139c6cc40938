use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use policy_desk_core::{
    derive_notifications, Admin, NewPolicy, NotificationFeed, PolicyError, PolicyPatch,
    PolicyRecord,
};

use crate::{AdminRepository, AdminStoreError};

/// Policy operations scoped to one admin aggregate.
///
/// Mutations are applied to the caller's in-memory aggregate and then the
/// whole aggregate is saved. A failed save leaves the caller's copy mutated;
/// the copy is request-scoped and dropped with the failed request.
#[derive(Clone)]
pub struct PolicyStore {
    admins: AdminRepository,
}

impl PolicyStore {
    pub fn new(admins: AdminRepository) -> Self {
        Self { admins }
    }

    /// Adds a policy and persists the aggregate.
    pub async fn add(
        &self,
        admin: &mut Admin,
        new: NewPolicy,
        now: DateTime<Utc>,
    ) -> Result<PolicyRecord, PolicyStoreError> {
        let created = admin.add_policy(new, now)?.clone();
        self.admins.save(admin).await?;
        info!(
            stage = "policies",
            admin_id = %admin.id,
            policy_id = %created.id,
            policy_number = %created.policy_number,
            "policy added"
        );
        Ok(created)
    }

    pub fn list<'a>(&self, admin: &'a Admin) -> &'a [PolicyRecord] {
        &admin.policies
    }

    pub fn get<'a>(&self, admin: &'a Admin, id: &str) -> Result<&'a PolicyRecord, PolicyStoreError> {
        Ok(admin.policy(id)?)
    }

    pub fn get_by_number<'a>(
        &self,
        admin: &'a Admin,
        policy_number: &str,
    ) -> Result<&'a PolicyRecord, PolicyStoreError> {
        Ok(admin.policy_by_number(policy_number)?)
    }

    pub fn search<'a>(&self, admin: &'a Admin, query: &str) -> Vec<&'a PolicyRecord> {
        admin.search_policies(query)
    }

    pub fn notifications(&self, admin: &Admin, now: DateTime<Utc>) -> NotificationFeed {
        derive_notifications(&admin.policies, now)
    }

    /// Overwrites the fields present in `patch` and persists the aggregate.
    pub async fn renew(
        &self,
        admin: &mut Admin,
        id: &str,
        patch: PolicyPatch,
        now: DateTime<Utc>,
    ) -> Result<PolicyRecord, PolicyStoreError> {
        let renewed = admin.renew_policy(id, patch, now)?.clone();
        self.admins.save(admin).await?;
        info!(
            stage = "policies",
            admin_id = %admin.id,
            policy_id = %renewed.id,
            "policy renewed"
        );
        Ok(renewed)
    }

    /// Removes every policy with `policy_number`, persists, and returns the removed count.
    pub async fn delete(
        &self,
        admin: &mut Admin,
        policy_number: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, PolicyStoreError> {
        let removed = admin.remove_policies(policy_number, now);
        self.admins.save(admin).await?;
        info!(
            stage = "policies",
            admin_id = %admin.id,
            %policy_number,
            removed,
            "policies deleted"
        );
        Ok(removed)
    }
}

#[derive(Debug, Error)]
pub enum PolicyStoreError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("failed to persist admin: {0}")]
    Storage(#[from] AdminStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{new_policy, now, registered, setup_db};
    use chrono::Duration;

    #[tokio::test]
    async fn add_persists_and_returns_record() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();

        let created = store
            .add(&mut admin, new_policy("P1"), now())
            .await
            .expect("add");

        let reloaded = db.admins().find_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.policies, vec![created.clone()]);
        assert_eq!(store.get(&reloaded, &created.id.to_string()).unwrap(), &created);
    }

    #[tokio::test]
    async fn duplicate_add_fails_with_conflict_and_keeps_store_unchanged() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        store
            .add(&mut admin, new_policy("DUP"), now())
            .await
            .expect("first add");

        let err = store
            .add(&mut admin, new_policy("DUP"), now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyStoreError::Policy(PolicyError::DuplicatePolicyNumber(ref number)) if number == "DUP"
        ));

        let reloaded = db.admins().find_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.policies.len(), 1);
    }

    #[tokio::test]
    async fn policy_numbers_are_scoped_per_admin() {
        let db = setup_db().await;
        let mut first = registered(&db, "one@example.com").await;
        let mut second = registered(&db, "two@example.com").await;
        let store = db.policies();

        store
            .add(&mut first, new_policy("SHARED"), now())
            .await
            .expect("first admin");
        store
            .add(&mut second, new_policy("SHARED"), now())
            .await
            .expect("second admin");

        assert_eq!(first.policies.len(), 1);
        assert_eq!(second.policies.len(), 1);
        assert_ne!(first.tenant_id, second.tenant_id);
    }

    #[tokio::test]
    async fn renew_persists_patch() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        let created = store
            .add(&mut admin, new_policy("P1"), now())
            .await
            .expect("add");
        let new_end = now() + Duration::days(400);

        let renewed = store
            .renew(
                &mut admin,
                &created.id.to_string(),
                PolicyPatch {
                    policy_end_date: Some(new_end),
                    ..PolicyPatch::default()
                },
                now(),
            )
            .await
            .expect("renew");
        assert_eq!(renewed.policy_number, "P1");

        let reloaded = db.admins().find_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.policies[0].policy_end_date, new_end);
    }

    #[tokio::test]
    async fn renew_with_colliding_number_succeeds() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        store.add(&mut admin, new_policy("P1"), now()).await.unwrap();
        let second = store.add(&mut admin, new_policy("P2"), now()).await.unwrap();

        let renewed = store
            .renew(
                &mut admin,
                &second.id.to_string(),
                PolicyPatch {
                    policy_number: Some("P1".into()),
                    ..PolicyPatch::default()
                },
                now(),
            )
            .await
            .expect("renew is not re-validated");
        assert_eq!(renewed.policy_number, "P1");

        let removed = store.delete(&mut admin, "P1", now()).await.expect("delete");
        assert_eq!(removed, 2);
        let reloaded = db.admins().find_by_id(admin.id).await.unwrap().unwrap();
        assert!(reloaded.policies.is_empty());
    }

    #[tokio::test]
    async fn renew_unknown_id_is_not_found() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let err = db
            .policies()
            .renew(&mut admin, "missing", PolicyPatch::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyStoreError::Policy(PolicyError::NotFound)));
    }

    #[tokio::test]
    async fn delete_without_match_succeeds() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        store.add(&mut admin, new_policy("P1"), now()).await.unwrap();

        let removed = store
            .delete(&mut admin, "nope", now())
            .await
            .expect("idempotent delete");
        assert_eq!(removed, 0);
        assert_eq!(store.list(&admin).len(), 1);
    }

    #[tokio::test]
    async fn empty_search_returns_everything() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        store.add(&mut admin, new_policy("P1"), now()).await.unwrap();
        store.add(&mut admin, new_policy("P2"), now()).await.unwrap();

        assert_eq!(store.search(&admin, "").len(), 2);
        assert_eq!(store.search(&admin, "p2").len(), 1);
    }

    #[tokio::test]
    async fn notifications_follow_stored_policies() {
        let db = setup_db().await;
        let mut admin = registered(&db, "owner@example.com").await;
        let store = db.policies();
        store.add(&mut admin, new_policy("P1"), now()).await.unwrap();

        let feed = store.notifications(&admin, now());
        assert_eq!(feed.count, 1);
        assert_eq!(feed.notifications[0].status.as_str(), "Expiring Soon");
    }
}
