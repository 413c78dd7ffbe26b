use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Nested under `/admin`. Access is decided by the gate pipeline middleware using the
/// `/admin` route rule (the `admin` capability alone; visitors without it, signed in or
/// not, are redirected to the dashboard), so the handlers here carry no role checks of
/// their own.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/access/{user_id}
        .route("/access/{user_id}", get(handlers::get_user_access))
}
