use uuid::Uuid;

use super::{Resolution, SnapshotCache};
use crate::repository::{RepoResult, RepositoryState};

/// BoardViewStore
///
/// Whether an admin has opted into previewing the app as a board member.
/// Missing rows and failed lookups both read as `false`.
pub struct BoardViewStore {
    repo: RepositoryState,
    cache: SnapshotCache<Uuid, bool>,
}

impl BoardViewStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            repo,
            cache: SnapshotCache::new(),
        }
    }

    pub async fn resolve(&self, user_id: Option<Uuid>) -> bool {
        let Some(user_id) = user_id else {
            return false;
        };
        self.cache
            .get_or_fetch(&user_id, || async {
                self.repo.get_board_view(user_id).await.unwrap_or_else(|e| {
                    tracing::error!(%user_id, "board view lookup failed: {}", e);
                    false
                })
            })
            .await
    }

    pub fn peek(&self, user_id: Option<Uuid>) -> Resolution<bool> {
        match user_id {
            None => Resolution::Ready(false),
            Some(id) => self.cache.peek(&id).into(),
        }
    }

    /// Persists the preference and drops the cached value.
    ///
    /// Callers must have checked that the user holds `admin` or `super_admin`.
    pub async fn set(&self, user_id: Uuid, enabled: bool) -> RepoResult<()> {
        self.repo.upsert_board_view(user_id, enabled).await?;
        self.cache.invalidate(&user_id);
        tracing::info!(%user_id, enabled, "board view preference updated");
        Ok(())
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(&user_id);
    }
}
