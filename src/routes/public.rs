use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. The gate endpoint evaluates anonymous callers as
/// having no access, so nothing here can widen what an anonymous visitor sees.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(|| async { "ok" }))
        // POST /gate/evaluate
        // Called by the web client on every navigation.
        .route("/gate/evaluate", post(handlers::evaluate_navigation))
        // DELETE /gate/mounts/{id}
        .route("/gate/mounts/{id}", delete(handlers::unmount))
        // DELETE /tour
        // Explicit tour exit.
        .route("/tour", delete(handlers::exit_tour))
}
