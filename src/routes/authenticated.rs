use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Self-service access endpoints. Every handler receives a validated `AuthUser`; the
/// board-view toggle additionally checks the admin capability itself.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me/access
        .route("/me/access", get(handlers::get_my_access))
        // PUT /me/role
        // Switch between creator and advertiser.
        .route("/me/role", put(handlers::switch_role))
        // PUT /me/board-view
        // Admin-only board preview opt-in.
        .route("/me/board-view", put(handlers::set_board_view))
        // POST /me/revalidate
        .route("/me/revalidate", post(handlers::revalidate))
}
