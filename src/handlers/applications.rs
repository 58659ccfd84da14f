use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    guard::{self, CONTENT_EDITORS},
    handlers::{require_text, validate_email},
    models::{
        Application, ContentKind, ContentStatus, CreateApplicationRequest, NewApplication,
        UpdateApplicationRequest,
    },
    session::SessionAccessor,
    storage::APPLICATION_UPLOAD,
};

const MAX_MESSAGE_CHARS: usize = 5000;

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// submit_application
///
/// [Public Route] Applies to an open competition. An attachment must already
/// have been uploaded through `/api/uploads/application`; only its path is stored.
#[utoipa::path(
    post,
    path = "/api/competitions/{id}/applications",
    params(("id" = Uuid, Path, description = "Competition id")),
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Application received", body = Application),
        (status = 400, description = "Validation failure or competition closed"),
        (status = 404, description = "Unknown competition")
    )
)]
pub async fn submit_application(
    State(state): State<AppState>,
    Path(competition_id): Path<Uuid>,
    Json(payload): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let backend = state.backend()?;

    require_text(&payload.applicant_name, "Name")?;
    let email = payload.email.trim().to_string();
    validate_email(&email)?;
    let message = trimmed(payload.message);
    if message
        .as_ref()
        .is_some_and(|m| m.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(ApiError::bad_request(format!(
            "Message is too long. Maximum length is {} characters.",
            MAX_MESSAGE_CHARS
        )));
    }
    let attachment_path = trimmed(payload.attachment_path);
    if let Some(path) = &attachment_path {
        let expected_prefix = format!("{}/", APPLICATION_UPLOAD.folder);
        if !path.starts_with(&expected_prefix) || path.contains("..") {
            return Err(ApiError::bad_request("Invalid attachment path"));
        }
    }

    let competition = backend
        .repo
        .get_content(ContentKind::Competitions, competition_id)
        .await?
        .filter(|c| c.status.is_public())
        .ok_or_else(|| ApiError::not_found("Competition not found"))?;
    if competition.status != ContentStatus::Open {
        return Err(ApiError::bad_request(
            "Competition is not accepting applications",
        ));
    }

    let application = backend
        .repo
        .create_application(NewApplication {
            competition_id,
            applicant_name: payload.applicant_name.trim().to_string(),
            email,
            phone: trimmed(payload.phone),
            message,
            attachment_path,
        })
        .await?;
    tracing::info!(competition = %competition_id, id = %application.id, "application submitted");

    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ApplicationFilter {
    pub competition_id: Option<Uuid>,
}

/// list_applications
///
/// [Admin Route] Submissions, optionally for a single competition.
#[utoipa::path(
    get,
    path = "/admin/api/applications",
    params(ApplicationFilter),
    responses(
        (status = 200, description = "Applications", body = [Application]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Insufficient role")
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;
    Ok(Json(
        backend.repo.list_applications(filter.competition_id).await?,
    ))
}

/// update_application
///
/// [Admin Route] Accepts or rejects a submission.
#[utoipa::path(
    patch,
    path = "/admin/api/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Updated", body = Application),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_application(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationRequest>,
) -> Result<Json<Application>, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;

    let application = backend
        .repo
        .set_application_status(id, payload.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;
    tracing::info!(id = %id, status = %payload.status, by = %caller.user_id, "application reviewed");

    Ok(Json(application))
}
