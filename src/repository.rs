use crate::models::{BoardViewRow, Capability, CapabilityRow, Permission, PrimaryRole, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

/// RepoError
///
/// Failures surfaced by the data layer. Stores log these and fall back to the
/// "no access" defaults; they never reach a client as a raw error.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("backing service unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Abstract contract for the rows the gating layer reads, plus the two writes it owns
/// (primary role switch and board-view upsert). Keyed by user identifier throughout.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> Option<User>;

    // --- Roles & Permissions ---
    async fn get_primary_role(&self, user_id: Uuid) -> RepoResult<Option<PrimaryRole>>;
    async fn set_primary_role(&self, user_id: Uuid, role: PrimaryRole) -> RepoResult<()>;
    async fn get_capabilities(&self, user_id: Uuid) -> RepoResult<BTreeSet<Capability>>;
    async fn get_permissions(&self, user_id: Uuid) -> RepoResult<BTreeSet<Permission>>;

    // --- Board View Preference ---
    // A missing row means the user never opted in.
    async fn get_board_view(&self, user_id: Uuid) -> RepoResult<bool>;
    async fn upsert_board_view(&self, user_id: Uuid, enabled: bool) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the hosted Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, current_role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    /// get_primary_role
    ///
    /// Unknown role strings are logged and treated as no role rather than failing the lookup.
    async fn get_primary_role(&self, user_id: Uuid) -> RepoResult<Option<PrimaryRole>> {
        let role: Option<Option<String>> =
            sqlx::query_scalar("SELECT current_role FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(role.flatten().and_then(|r| match r.parse::<PrimaryRole>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(%user_id, "ignoring stored primary role: {}", e);
                None
            }
        }))
    }

    async fn set_primary_role(&self, user_id: Uuid, role: PrimaryRole) -> RepoResult<()> {
        let result = sqlx::query("UPDATE profiles SET current_role = $2 WHERE id = $1")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn get_capabilities(&self, user_id: Uuid) -> RepoResult<BTreeSet<Capability>> {
        let rows = sqlx::query_as::<_, CapabilityRow>(
            "SELECT user_id, role FROM user_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        // Primary roles share the user_roles table in some deployments; only capability rows count here.
        Ok(rows
            .into_iter()
            .filter_map(|row| row.role.parse::<Capability>().ok())
            .collect())
    }

    /// get_permissions
    ///
    /// Permissions are granted to capability roles and flattened per user.
    async fn get_permissions(&self, user_id: Uuid) -> RepoResult<BTreeSet<Permission>> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT rp.permission
            FROM role_permissions rp
            JOIN user_roles ur ON ur.role = rp.role
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Permission).collect())
    }

    async fn get_board_view(&self, user_id: Uuid) -> RepoResult<bool> {
        let row = sqlx::query_as::<_, BoardViewRow>(
            "SELECT user_id, board_view_enabled FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.board_view_enabled).unwrap_or(false))
    }

    async fn upsert_board_view(&self, user_id: Uuid, enabled: bool) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, board_view_enabled, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET board_view_enabled = EXCLUDED.board_view_enabled, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in memory, for local development and tests.
/// `fail_reads` simulates an unreachable backing service; `fetch_count` counts role
/// lookups so callers can check that concurrent readers share one fetch.
#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<HashMap<Uuid, User>>,
    capabilities: Mutex<HashMap<Uuid, BTreeSet<Capability>>>,
    permissions: Mutex<HashMap<Uuid, BTreeSet<Permission>>>,
    board_view: Mutex<HashMap<Uuid, bool>>,
    pub fail_reads: AtomicBool,
    pub fetch_count: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        let repo = Self::default();
        repo.fail_reads.store(true, Ordering::SeqCst);
        repo
    }

    /// Registers a user with the given primary role and capabilities.
    pub fn with_user(
        self,
        id: Uuid,
        primary_role: Option<PrimaryRole>,
        capabilities: &[Capability],
    ) -> Self {
        self.users.lock().unwrap().insert(
            id,
            User {
                id,
                email: format!("{}@seeksy.test", id.simple()),
                current_role: primary_role.map(|r| r.as_str().to_string()),
            },
        );
        self.capabilities
            .lock()
            .unwrap()
            .insert(id, capabilities.iter().copied().collect());
        self
    }

    pub fn with_permissions(self, id: Uuid, permissions: &[&str]) -> Self {
        self.permissions
            .lock()
            .unwrap()
            .insert(id, permissions.iter().map(|p| Permission::new(*p)).collect());
        self
    }

    pub fn with_board_view(self, id: Uuid, enabled: bool) -> Self {
        self.board_view.lock().unwrap().insert(id, enabled);
        self
    }

    /// Replaces a user's capabilities, e.g. to revoke admin mid-session.
    pub fn set_capabilities(&self, id: Uuid, capabilities: &[Capability]) {
        self.capabilities
            .lock()
            .unwrap()
            .insert(id, capabilities.iter().copied().collect());
    }

    fn check_available(&self) -> RepoResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable(
                "in-memory repository set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    async fn get_primary_role(&self, user_id: Uuid) -> RepoResult<Option<PrimaryRole>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let users = self.users.lock().unwrap();
        Ok(users
            .get(&user_id)
            .and_then(|u| u.current_role.as_deref())
            .and_then(|r| r.parse().ok()))
    }

    async fn set_primary_role(&self, user_id: Uuid, role: PrimaryRole) -> RepoResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&user_id)
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))?;
        user.current_role = Some(role.as_str().to_string());
        Ok(())
    }

    async fn get_capabilities(&self, user_id: Uuid) -> RepoResult<BTreeSet<Capability>> {
        self.check_available()?;
        Ok(self
            .capabilities
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_permissions(&self, user_id: Uuid) -> RepoResult<BTreeSet<Permission>> {
        self.check_available()?;
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_board_view(&self, user_id: Uuid) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self
            .board_view
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(false))
    }

    async fn upsert_board_view(&self, user_id: Uuid, enabled: bool) -> RepoResult<()> {
        self.board_view.lock().unwrap().insert(user_id, enabled);
        Ok(())
    }
}
