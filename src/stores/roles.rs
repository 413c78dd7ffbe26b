use uuid::Uuid;

use super::{Resolution, SnapshotCache};
use crate::{
    models::{PrimaryRole, RoleAssignment},
    repository::{RepoError, RepositoryState},
};

/// RoleStore
///
/// Resolves a user's primary role, capability flags and permissions, cached per user.
/// Anonymous sessions resolve immediately to the empty assignment.
///
/// Lookup failures never grant access: each failing part falls back to empty, and the
/// primary role falls back to `role_lookup_fallback`, which is `None` unless an
/// operator configured otherwise.
pub struct RoleStore {
    repo: RepositoryState,
    cache: SnapshotCache<Uuid, RoleAssignment>,
    role_lookup_fallback: Option<PrimaryRole>,
}

impl RoleStore {
    pub fn new(repo: RepositoryState, role_lookup_fallback: Option<PrimaryRole>) -> Self {
        Self {
            repo,
            cache: SnapshotCache::new(),
            role_lookup_fallback,
        }
    }

    pub async fn resolve(&self, user_id: Option<Uuid>) -> RoleAssignment {
        let Some(user_id) = user_id else {
            return RoleAssignment::default();
        };
        self.cache
            .get_or_fetch(&user_id, || self.fetch(user_id))
            .await
    }

    pub fn peek(&self, user_id: Option<Uuid>) -> Resolution<RoleAssignment> {
        match user_id {
            None => Resolution::Ready(RoleAssignment::default()),
            Some(id) => self.cache.peek(&id).into(),
        }
    }

    /// Drops the cached assignment so the next read goes back to the repository.
    pub fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(&user_id);
    }

    async fn fetch(&self, user_id: Uuid) -> RoleAssignment {
        let (primary, capabilities, permissions) = tokio::join!(
            self.repo.get_primary_role(user_id),
            self.repo.get_capabilities(user_id),
            self.repo.get_permissions(user_id),
        );

        let primary_role = primary.unwrap_or_else(|e| {
            log_failure("primary role", user_id, &e);
            self.role_lookup_fallback
        });

        RoleAssignment {
            primary_role,
            capabilities: capabilities.unwrap_or_else(|e| {
                log_failure("capabilities", user_id, &e);
                Default::default()
            }),
            permissions: permissions.unwrap_or_else(|e| {
                log_failure("permissions", user_id, &e);
                Default::default()
            }),
        }
    }
}

fn log_failure(what: &str, user_id: Uuid, err: &RepoError) {
    tracing::error!(%user_id, "{} lookup failed, resolving to no access: {}", what, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Capability, Permission},
        repository::InMemoryRepository,
    };
    use std::sync::{Arc, atomic::Ordering};

    const USER: Uuid = Uuid::from_u128(10);

    #[tokio::test]
    async fn anonymous_resolves_to_no_access() {
        let store = RoleStore::new(Arc::new(InMemoryRepository::new()), None);
        assert_eq!(store.resolve(None).await, RoleAssignment::default());
        assert_eq!(store.peek(None), Resolution::Ready(RoleAssignment::default()));
    }

    #[tokio::test]
    async fn resolves_all_parts() {
        let repo = InMemoryRepository::new()
            .with_user(USER, Some(PrimaryRole::Creator), &[Capability::Admin])
            .with_permissions(USER, &["studio.record"]);
        let store = RoleStore::new(Arc::new(repo), None);

        assert!(store.peek(Some(USER)).is_loading());
        let roles = store.resolve(Some(USER)).await;

        assert_eq!(roles.primary_role, Some(PrimaryRole::Creator));
        assert!(roles.is_admin());
        assert!(roles.has_permission(&Permission::new("studio.record")));
        assert_eq!(store.peek(Some(USER)), Resolution::Ready(roles));
    }

    #[tokio::test]
    async fn failed_lookup_is_fail_closed() {
        let repo = InMemoryRepository::new_failing().with_user(
            USER,
            Some(PrimaryRole::Advertiser),
            &[Capability::Admin],
        );
        let store = RoleStore::new(Arc::new(repo), None);

        assert_eq!(store.resolve(Some(USER)).await, RoleAssignment::default());
    }

    #[tokio::test]
    async fn configured_fallback_only_covers_primary_role() {
        let repo = InMemoryRepository::new_failing().with_user(USER, None, &[Capability::Admin]);
        let store = RoleStore::new(Arc::new(repo), Some(PrimaryRole::Creator));

        let roles = store.resolve(Some(USER)).await;
        assert_eq!(roles.primary_role, Some(PrimaryRole::Creator));
        assert!(!roles.is_admin());
    }

    #[tokio::test]
    async fn revocation_is_seen_after_invalidate() {
        let repo = Arc::new(
            InMemoryRepository::new().with_user(USER, None, &[Capability::Admin]),
        );
        let store = RoleStore::new(repo.clone(), None);

        assert!(store.resolve(Some(USER)).await.is_admin());
        repo.set_capabilities(USER, &[]);
        assert!(store.resolve(Some(USER)).await.is_admin());

        store.invalidate(USER);
        assert!(!store.resolve(Some(USER)).await.is_admin());
        assert_eq!(repo.fetch_count.load(Ordering::SeqCst), 2);
    }
}
