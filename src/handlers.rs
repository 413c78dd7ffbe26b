use crate::{
    auth::{AuthUser, Session},
    models::{AccessSnapshot, BoardViewRequest, EvaluateRequest, SwitchRoleRequest, TourStatus},
    repository::RepositoryState,
    service::{EvaluateResponse, GateState},
    stores::TourMode,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Handlers ---

/// evaluate_navigation
///
/// [Public Route] Runs the gate pipeline for one client navigation. Anonymous callers are
/// evaluated as a session with no access.
#[utoipa::path(
    post,
    path = "/gate/evaluate",
    request_body = EvaluateRequest,
    responses((status = 200, description = "Navigation decision", body = EvaluateResponse))
)]
pub async fn evaluate_navigation(
    session: Session,
    State(gate): State<GateState>,
    Json(payload): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    Json(gate.evaluate(&session, &payload).await)
}

/// unmount
///
/// [Public Route] Forgets a mount. Evaluations for it still in flight are answered as superseded.
#[utoipa::path(
    delete,
    path = "/gate/mounts/{id}",
    params(("id" = Uuid, Path, description = "Mount ID")),
    responses(
        (status = 204, description = "Unmounted"),
        (status = 404, description = "Unknown mount")
    )
)]
pub async fn unmount(State(gate): State<GateState>, Path(id): Path<Uuid>) -> StatusCode {
    if gate.mounts.unmount(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// exit_tour
///
/// [Public Route] Explicitly leaves tour mode. The client drops its token.
#[utoipa::path(
    delete,
    path = "/tour",
    responses((status = 200, description = "Tour exited", body = TourStatus))
)]
pub async fn exit_tour(session: Session) -> Json<TourStatus> {
    tracing::info!(user_id = ?session.user_id(), "tour mode exited explicitly");
    Json(TourMode::exit())
}

/// get_my_access
///
/// [Authenticated Route] The caller's resolved roles and board-view preference.
#[utoipa::path(
    get,
    path = "/me/access",
    responses((status = 200, description = "Access snapshot", body = AccessSnapshot))
)]
pub async fn get_my_access(
    AuthUser { id, .. }: AuthUser,
    State(gate): State<GateState>,
) -> Json<AccessSnapshot> {
    Json(gate.snapshot(Some(id)).await)
}

/// switch_role
///
/// [Authenticated Route] Switches the caller's primary role. Capability flags are untouched.
#[utoipa::path(
    put,
    path = "/me/role",
    request_body = SwitchRoleRequest,
    responses(
        (status = 200, description = "Switched", body = AccessSnapshot),
        (status = 503, description = "Backing service unavailable")
    )
)]
pub async fn switch_role(
    AuthUser { id, .. }: AuthUser,
    State(repo): State<RepositoryState>,
    State(gate): State<GateState>,
    Json(payload): Json<SwitchRoleRequest>,
) -> Result<Json<AccessSnapshot>, StatusCode> {
    repo.set_primary_role(id, payload.role).await.map_err(|e| {
        tracing::error!(user_id = %id, "primary role switch failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    gate.roles.invalidate(id);
    tracing::info!(user_id = %id, role = %payload.role, "primary role switched");
    Ok(Json(gate.snapshot(Some(id)).await))
}

/// set_board_view
///
/// [Authenticated Route] Toggles board preview mode.
///
/// *Authorization*: only `admin` or `super_admin` holders may set the preference.
#[utoipa::path(
    put,
    path = "/me/board-view",
    request_body = BoardViewRequest,
    responses(
        (status = 200, description = "Updated", body = AccessSnapshot),
        (status = 403, description = "Not an admin"),
        (status = 503, description = "Backing service unavailable")
    )
)]
pub async fn set_board_view(
    AuthUser { id, .. }: AuthUser,
    State(gate): State<GateState>,
    Json(payload): Json<BoardViewRequest>,
) -> Result<Json<AccessSnapshot>, StatusCode> {
    // Always check against fresh roles; a cached admin flag may already be revoked.
    gate.roles.invalidate(id);
    if !gate.roles.resolve(Some(id)).await.is_admin() {
        tracing::warn!(target: "audit", user_id = %id, "board view toggle refused");
        return Err(StatusCode::FORBIDDEN);
    }

    gate.board_view.set(id, payload.enabled).await.map_err(|e| {
        tracing::error!(user_id = %id, "board view upsert failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(gate.snapshot(Some(id)).await))
}

/// revalidate
///
/// [Authenticated Route] Drops the caller's cached access data, e.g. when the app regains focus.
#[utoipa::path(
    post,
    path = "/me/revalidate",
    responses((status = 204, description = "Caches invalidated"))
)]
pub async fn revalidate(AuthUser { id, .. }: AuthUser, State(gate): State<GateState>) -> StatusCode {
    gate.revalidate(id);
    StatusCode::NO_CONTENT
}

/// get_user_access
///
/// [Admin Route] Inspects another user's resolved access.
#[utoipa::path(
    get,
    path = "/admin/access/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Access snapshot", body = AccessSnapshot),
        (status = 303, description = "Redirected by the gate pipeline"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_user_access(
    State(repo): State<RepositoryState>,
    State(gate): State<GateState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccessSnapshot>, StatusCode> {
    if repo.get_user(user_id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(gate.snapshot(Some(user_id)).await))
}
