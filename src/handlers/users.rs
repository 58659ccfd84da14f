use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    guard::{self, ADMIN_ONLY, CONTENT_READERS, DASHBOARD_BOOTSTRAP},
    models::{DashboardStats, Profile, UpdateRoleRequest},
    session::SessionAccessor,
};

/// get_me
///
/// [Admin Route] The caller's own profile. This is the first call the dashboard
/// makes, so it is the endpoint that provisions and (when enabled) self-heals.
#[utoipa::path(
    get,
    path = "/admin/api/me",
    responses(
        (status = 200, description = "Caller profile", body = Profile),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Insufficient role")
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    mut session: SessionAccessor,
) -> Result<Json<Profile>, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &DASHBOARD_BOOTSTRAP).await?;

    backend
        .repo
        .get_profile(caller.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}

/// list_users
///
/// [Admin Route] Every profile.
#[utoipa::path(
    get,
    path = "/admin/api/users",
    responses((status = 200, description = "Profiles", body = [Profile]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    mut session: SessionAccessor,
) -> Result<Json<Vec<Profile>>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &ADMIN_ONLY).await?;
    Ok(Json(backend.repo.list_profiles().await?))
}

/// update_user_role
///
/// [Admin Route] Changes a profile's role.
#[utoipa::path(
    patch,
    path = "/admin/api/users/{id}/role",
    params(("id" = Uuid, Path, description = "Profile id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Profile>, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &ADMIN_ONLY).await?;

    let profile = backend
        .repo
        .update_profile_role(id, payload.role)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!(user_id = %id, role = %payload.role, by = %caller.user_id, "role changed");

    Ok(Json(profile))
}

/// delete_user
///
/// [Admin Route] Removes the auth user first, then the profile. Admins cannot
/// delete themselves.
#[utoipa::path(
    delete,
    path = "/admin/api/users/{id}",
    params(("id" = Uuid, Path, description = "Profile id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &ADMIN_ONLY).await?;

    if caller.user_id == id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }
    if backend.repo.get_profile(id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    backend.auth.delete_user(id).await?;
    backend.repo.delete_profile(id).await?;
    tracing::info!(user_id = %id, by = %caller.user_id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// get_dashboard_stats
///
/// [Admin Route] Counters for the dashboard landing page.
#[utoipa::path(
    get,
    path = "/admin/api/stats",
    responses((status = 200, description = "Counters", body = DashboardStats))
)]
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    mut session: SessionAccessor,
) -> Result<Json<DashboardStats>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_READERS).await?;
    Ok(Json(backend.repo.dashboard_stats().await?))
}
