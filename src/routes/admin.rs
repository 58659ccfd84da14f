use crate::{AppState, handlers, routes::UPLOAD_BODY_LIMIT};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Admin Router
///
/// The console pages and its JSON API. Pages are redirected by the edge gate;
/// every `/admin/api` handler runs the route guard with its own policy.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::pages::dashboard_page))
        .route("/admin/login", get(handlers::pages::login_page))
        // Caller profile; provisions (and may self-heal) on first dashboard load.
        .route("/admin/api/me", get(handlers::users::get_me))
        .route("/admin/api/stats", get(handlers::users::get_dashboard_stats))
        .route(
            "/admin/api/content/{kind}",
            get(handlers::content::list_admin_content).post(handlers::content::create_content),
        )
        .route(
            "/admin/api/content/{kind}/{id}",
            get(handlers::content::get_admin_content)
                .put(handlers::content::update_content)
                .delete(handlers::content::delete_content),
        )
        .route("/admin/api/comments", get(handlers::engagement::list_comments_admin))
        .route(
            "/admin/api/comments/{id}",
            patch(handlers::engagement::moderate_comment)
                .delete(handlers::engagement::delete_comment),
        )
        .route(
            "/admin/api/applications",
            get(handlers::applications::list_applications),
        )
        .route(
            "/admin/api/applications/{id}",
            patch(handlers::applications::update_application),
        )
        .route("/admin/api/users", get(handlers::users::list_users))
        .route(
            "/admin/api/users/{id}",
            axum::routing::delete(handlers::users::delete_user),
        )
        .route(
            "/admin/api/users/{id}/role",
            patch(handlers::users::update_user_role),
        )
        .route("/admin/api/storage", get(handlers::uploads::list_storage))
        .route(
            "/admin/api/uploads/image",
            post(handlers::uploads::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/admin/api/uploads/publication",
            post(handlers::uploads::upload_publication)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
