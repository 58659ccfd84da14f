use axum::{Router, http::HeaderName, middleware};
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
pub mod error;
pub mod gate;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;

// Routers segregated by audience: public site, session endpoints, admin console.
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use auth::{AuthState, MockAuthService, SupabaseAuthClient};
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::content::list_public_content, handlers::content::get_public_content,
        handlers::content::list_admin_content, handlers::content::get_admin_content,
        handlers::content::create_content, handlers::content::update_content,
        handlers::content::delete_content,
        handlers::engagement::record_view, handlers::engagement::toggle_like,
        handlers::engagement::list_blog_comments, handlers::engagement::add_comment,
        handlers::engagement::list_comments_admin, handlers::engagement::moderate_comment,
        handlers::engagement::delete_comment,
        handlers::applications::submit_application, handlers::applications::list_applications,
        handlers::applications::update_application,
        handlers::uploads::upload_image, handlers::uploads::upload_publication,
        handlers::uploads::upload_application_file, handlers::uploads::list_storage,
        handlers::users::get_me, handlers::users::list_users, handlers::users::update_user_role,
        handlers::users::delete_user, handlers::users::get_dashboard_stats,
        handlers::session::login, handlers::session::logout,
    ),
    components(
        schemas(
            models::Role, models::Profile, models::UpdateRoleRequest,
            models::ContentKind, models::ContentStatus, models::ContentEntry, models::ContentPage,
            models::CreateContentRequest, models::UpdateContentRequest,
            models::LikeRequest, models::LikeToggle, models::ViewCount,
            models::CommentStatus, models::Comment, models::CreateCommentRequest,
            models::ModerateCommentRequest,
            models::ApplicationStatus, models::Application, models::CreateApplicationRequest,
            models::UpdateApplicationRequest,
            models::StoredObject, models::StoredFile,
            models::LoginRequest, models::LoginResponse, models::DashboardStats,
        )
    ),
    tags(
        (name = "youth-site", description = "Public site and admin console API")
    )
)]
struct ApiDoc;

/// Backend
///
/// The hosted-platform collaborators. Exists only when the platform is configured.
#[derive(Clone)]
pub struct Backend {
    /// Relational store (profiles, content, comments, applications).
    pub repo: RepositoryState,
    /// Authentication service (session verification, refresh, sign-in/out).
    pub auth: AuthState,
    /// Object storage for uploads.
    pub storage: StorageState,
}

/// AppState
///
/// The single, cloneable container shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// `None` in development no-op mode.
    pub backend: Option<Backend>,
}

impl AppState {
    /// The "is the platform deployed?" check every data-touching handler starts
    /// with. Distinct from authorization failures.
    pub fn backend(&self) -> Result<&Backend, ApiError> {
        self.backend.as_ref().ok_or(ApiError::NotConfigured)
    }
}

/// create_router
///
/// Assembles the routers, the edge gate and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(routes::session::session_routes())
        .merge(admin::admin_routes())
        // First line of defence for the admin area. Fails open; handlers re-check.
        .layer(middleware::from_fn_with_state(state.clone(), gate::edge_gate))
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
/// Span for `TraceLayer`, correlating every log line of a request by its
/// `x-request-id`.
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
