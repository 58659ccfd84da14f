use crate::{AppState, handlers, routes::UPLOAD_BODY_LIMIT};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Public Router
///
/// Unauthenticated endpoints. Read handlers filter to public statuses themselves,
/// so drafts never leave the store through this router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Liveness check; answers even when the platform is not configured.
        .route("/health", get(|| async { "ok" }))
        // GET /api/content/{kind}?page=&limit=&search=&category=
        .route("/api/content/{kind}", get(handlers::content::list_public_content))
        .route(
            "/api/content/{kind}/{slug}",
            get(handlers::content::get_public_content),
        )
        .route("/api/blogs/{id}/view", post(handlers::engagement::record_view))
        .route("/api/blogs/{id}/like", post(handlers::engagement::toggle_like))
        .route(
            "/api/blogs/{id}/comments",
            get(handlers::engagement::list_blog_comments).post(handlers::engagement::add_comment),
        )
        .route(
            "/api/competitions/{id}/applications",
            post(handlers::applications::submit_application),
        )
        .route(
            "/api/uploads/application",
            post(handlers::uploads::upload_application_file)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
