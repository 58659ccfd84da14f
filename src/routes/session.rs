use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Session Router
///
/// Cookie-based sign-in and sign-out. Outside the admin prefix, so the edge
/// gate never intercepts them.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::session::login))
        .route("/auth/logout", post(handlers::session::logout))
}
