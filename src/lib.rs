use axum::{
    Json, Router,
    extract::{FromRef, OriginalUri, Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod gates;
pub mod handlers;
pub mod models;
pub mod mounts;
pub mod pipeline;
pub mod repository;
pub mod service;
pub mod stores;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

use auth::{AuthUser, Session};
use gates::{Decision, Verdict};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::{GateService, GateState};

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::evaluate_navigation, handlers::unmount, handlers::exit_tour,
        handlers::get_my_access, handlers::switch_role, handlers::set_board_view,
        handlers::revalidate, handlers::get_user_access
    ),
    components(
        schemas(
            models::EvaluateRequest, models::SwitchRoleRequest, models::BoardViewRequest,
            models::AccessSnapshot, models::RoleAssignment, models::TourStatus,
            models::PrimaryRole, models::Capability, models::Permission,
            gates::Decision, gates::Redirect, gates::Denial, gates::Notice,
            service::EvaluateResponse,
        )
    ),
    tags(
        (name = "seeksy-gate", description = "Seeksy view-routing and access-gating API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single shared container for the repository, the loaded configuration and the gate
/// service. Cloned per request; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub gate: GateState,
}

impl AppState {
    /// Builds the state, including the gate service, from a repository and config.
    pub fn new(repo: RepositoryState, config: AppConfig, table: pipeline::RouteTable) -> Self {
        let gate = std::sync::Arc::new(GateService::new(repo.clone(), &config, table));
        Self { repo, config, gate }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        app_state.gate.clone()
    }
}

/// auth_middleware
///
/// Rejects unauthenticated requests with 401 by extracting `AuthUser` before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// gate_middleware
///
/// Runs the gate pipeline against the original request path, so server routes obey the
/// same ordered rules as client navigations.
async fn gate_middleware(
    State(gate): State<GateState>,
    OriginalUri(uri): OriginalUri,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let hostname = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let verdict = gate.check(&session, uri.path(), hostname.as_deref()).await;
    match verdict_response(verdict) {
        Some(response) => response,
        None => next.run(request).await,
    }
}

/// Maps a non-render verdict onto an HTTP response; `None` means "let the request through".
///
/// * `Loading`: 503 with `Retry-After: 1`
/// * `Redirect`: 303 with `Location`
/// * `Deny`: 403
pub fn verdict_response(verdict: Verdict) -> Option<Response> {
    let notice = verdict.notice;
    match verdict.decision {
        Decision::Render => None,
        Decision::Loading => {
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "decision": Decision::Loading })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            Some(response)
        }
        Decision::Redirect(redirect) => {
            let location = HeaderValue::from_str(&redirect.to).ok();
            let mut response = (
                StatusCode::SEE_OTHER,
                Json(json!({ "decision": Decision::Redirect(redirect), "notice": notice })),
            )
                .into_response();
            if let Some(location) = location {
                response.headers_mut().insert(header::LOCATION, location);
            }
            Some(response)
        }
        Decision::Deny(denial) => Some(
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "decision": Decision::Deny(denial), "notice": notice })),
            )
                .into_response(),
        ),
    }
}

/// create_router
///
/// Assembles routing, scoped middleware and shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public: session optional.
        .merge(public::public_routes())
        // Authenticated: any signed-in user.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin: the gate pipeline decides, exactly as for client navigations under /admin.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                gate_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Per-request span carrying method, URI and the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
