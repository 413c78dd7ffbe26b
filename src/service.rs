use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Session,
    config::AppConfig,
    gates::{Decision, GateContext, Notice, Verdict, normalize_path},
    models::{AccessSnapshot, EvaluateRequest, RoleAssignment, TourStatus},
    mounts::{GuardMount, MountRegistry},
    pipeline::{Pipeline, RouteTable},
    repository::RepositoryState,
    stores::{BoardViewStore, Resolution, RoleStore, TourMode, TourTokens},
};

/// EvaluateResponse
///
/// The answer to one navigation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EvaluateResponse {
    pub decision: Decision,
    pub notice: Option<Notice>,
    /// The redirect in `decision` was already issued for this path entry; do not navigate again.
    pub duplicate: bool,
    /// A newer navigation overtook this one; the client must ignore the response.
    pub superseded: bool,
    /// Tour state after this navigation. A superseded response is never evaluated for
    /// tour mode and carries the default status, which asks the client to keep whatever
    /// token it holds.
    pub tour: TourStatus,
}

/// GateService
///
/// Composes the stores, the pipeline and the mount registry. Shared across requests as
/// `Arc<GateService>`.
pub struct GateService {
    pub roles: RoleStore,
    pub board_view: BoardViewStore,
    pub tour: TourMode,
    pub pipeline: Pipeline,
    pub mounts: MountRegistry,
}

/// GateState
///
/// The concrete type used to share the gate service across the application state.
pub type GateState = Arc<GateService>;

impl GateService {
    pub fn new(repo: RepositoryState, config: &AppConfig, table: RouteTable) -> Self {
        let settings = config.gate.clone();
        Self {
            roles: RoleStore::new(repo.clone(), settings.role_lookup_fallback),
            board_view: BoardViewStore::new(repo),
            tour: TourMode::new(
                TourTokens::new(&config.tour_secret, settings.tour_token_ttl),
                settings.tour_routes.clone(),
            ),
            mounts: MountRegistry::with_idle_ttl(settings.mount_idle_ttl),
            pipeline: Pipeline::new(table, settings),
        }
    }

    /// Resolves roles and board preference for the session, waiting at most the configured
    /// fetch timeout. Fetches that outlast the timeout keep running in the background and
    /// fill the cache for the next evaluation; this one sees `Loading`.
    pub async fn context(
        self: &Arc<Self>,
        session: &Session,
        path: &str,
        hostname: Option<&str>,
    ) -> GateContext {
        let user_id = session.user_id();
        let service = Arc::clone(self);
        let fetch = tokio::spawn(async move {
            tokio::join!(
                service.roles.resolve(user_id),
                service.board_view.resolve(user_id)
            )
        });

        let timeout = self.pipeline.settings().fetch_timeout;
        let (roles, board_view) = match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok((roles, board_view))) => (Resolution::Ready(roles), Resolution::Ready(board_view)),
            Ok(Err(e)) => {
                tracing::error!(?user_id, "store fetch task failed: {}", e);
                (
                    Resolution::Ready(RoleAssignment::default()),
                    Resolution::Ready(false),
                )
            }
            Err(_) => {
                tracing::warn!(?user_id, ?timeout, "store fetch still pending, answering loading");
                (self.roles.peek(user_id), self.board_view.peek(user_id))
            }
        };

        GateContext {
            path: normalize_path(path),
            hostname: hostname.map(str::to_string),
            session: Resolution::Ready(user_id),
            roles,
            board_view,
        }
    }

    /// Runs the pipeline for a server-side request.
    pub async fn check(
        self: &Arc<Self>,
        session: &Session,
        path: &str,
        hostname: Option<&str>,
    ) -> Verdict {
        let ctx = self.context(session, path, hostname).await;
        self.pipeline.evaluate(&ctx)
    }

    /// Handles one client navigation end to end.
    pub async fn evaluate(
        self: &Arc<Self>,
        session: &Session,
        req: &EvaluateRequest,
    ) -> EvaluateResponse {
        let path = normalize_path(&req.path);

        let fresh = match req.mount_id {
            Some(id) => self.mounts.begin(id, req.seq, &path),
            None => true,
        };
        if !fresh {
            tracing::debug!(mount_id = ?req.mount_id, seq = req.seq, "navigation superseded before evaluation");
            return EvaluateResponse {
                decision: Decision::Loading,
                notice: None,
                duplicate: false,
                superseded: true,
                tour: TourStatus::default(),
            };
        }

        let ctx = self.context(session, &path, req.hostname.as_deref()).await;
        let verdict = self.pipeline.evaluate(&ctx);

        let settled = match req.mount_id {
            Some(id) => self.mounts.settle(id, req.seq, verdict),
            None => {
                let mut once = GuardMount::new();
                once.begin(req.seq, &path);
                once.settle(req.seq, verdict)
            }
        };

        let subject = tour_subject(session.user_id());
        let tour = self.tour.on_navigation(
            &subject,
            &path,
            req.from_onboarding,
            req.tour_token.as_deref(),
            Utc::now(),
        );

        tracing::info!(
            user_id = ?session.user_id(),
            path = %path,
            decision = ?settled.decision,
            duplicate = settled.duplicate,
            superseded = settled.superseded,
            tour_active = tour.active,
            "navigation evaluated"
        );

        EvaluateResponse {
            decision: settled.decision,
            notice: settled.notice,
            duplicate: settled.duplicate,
            superseded: settled.superseded,
            tour,
        }
    }

    pub async fn snapshot(&self, user_id: Option<Uuid>) -> AccessSnapshot {
        let (roles, board_view_enabled) =
            tokio::join!(self.roles.resolve(user_id), self.board_view.resolve(user_id));
        AccessSnapshot {
            user_id,
            roles,
            board_view_enabled,
        }
    }

    /// Controlled revalidation: the next read of either store goes back to the repository.
    pub fn revalidate(&self, user_id: Uuid) {
        self.roles.invalidate(user_id);
        self.board_view.invalidate(user_id);
        tracing::debug!(%user_id, "access caches invalidated");
    }
}

/// Tour tokens are bound to the user they were issued to; visitors share one subject.
pub fn tour_subject(user_id: Option<Uuid>) -> String {
    user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}
