use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    AppState, Backend,
    error::ApiError,
    guard::{self, CONTENT_EDITORS},
    models::{StoredFile, StoredObject},
    session::SessionAccessor,
    storage::{
        APPLICATION_UPLOAD, IMAGE_UPLOAD, KNOWN_FOLDERS, PUBLICATION_UPLOAD, UploadPolicy,
        UploadRejection,
    },
};

/// Name of the multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Multipart form accepted by every upload endpoint (documentation only).
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    file: String,
}

struct IncomingFile {
    file_name: Option<String>,
    content_type: String,
    bytes: Vec<u8>,
}

async fn read_file_field(mut multipart: Multipart) -> Result<Option<IncomingFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?;
        return Ok(Some(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// store_upload
///
/// Shared pipeline for every upload endpoint: read the `file` field, apply the
/// policy, and only then write to storage.
async fn store_upload(
    backend: &Backend,
    policy: &UploadPolicy,
    multipart: Multipart,
) -> Result<StoredObject, ApiError> {
    let file = read_file_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request(policy.rejection_message(&UploadRejection::MissingFile)))?;

    if let Err(rejection) = policy.check(&file.content_type, file.bytes.len()) {
        tracing::debug!(
            folder = policy.folder,
            content_type = %file.content_type,
            size = file.bytes.len(),
            ?rejection,
            "upload rejected"
        );
        return Err(ApiError::bad_request(policy.rejection_message(&rejection)));
    }

    let path = policy.object_path(file.file_name.as_deref());
    backend
        .storage
        .upload(&path, file.bytes, &file.content_type)
        .await?;
    tracing::info!(path = %path, "file uploaded");

    Ok(StoredObject {
        public_url: backend.storage.public_url(&path),
        path,
    })
}

/// upload_image
///
/// [Admin Route] Cover and inline images for content.
#[utoipa::path(
    post,
    path = "/admin/api/uploads/image",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Field `file`: jpeg, png, webp or gif, at most 5MB"),
    responses(
        (status = 201, description = "Stored", body = StoredObject),
        (status = 400, description = "Missing file, wrong type or too large")
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>), ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;
    let stored = store_upload(backend, &IMAGE_UPLOAD, multipart).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// upload_publication
///
/// [Admin Route] PDF documents attached to publications.
#[utoipa::path(
    post,
    path = "/admin/api/uploads/publication",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Field `file`: pdf, at most 50MB"),
    responses(
        (status = 201, description = "Stored", body = StoredObject),
        (status = 400, description = "Missing file, wrong type or too large")
    )
)]
pub async fn upload_publication(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>), ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;
    let stored = store_upload(backend, &PUBLICATION_UPLOAD, multipart).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// upload_application_file
///
/// [Public Route] Attachment for a competition application. Anonymous, so the
/// tightest ceiling applies.
#[utoipa::path(
    post,
    path = "/api/uploads/application",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Field `file`: pdf, jpeg, png, doc or docx, at most 2MB"),
    responses(
        (status = 201, description = "Stored", body = StoredObject),
        (status = 400, description = "Missing file, wrong type or too large")
    )
)]
pub async fn upload_application_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>), ApiError> {
    let backend = state.backend()?;
    let stored = store_upload(backend, &APPLICATION_UPLOAD, multipart).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct StorageQuery {
    /// One of `blog-images`, `publications`, `competition-applications`.
    pub folder: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// list_storage
///
/// [Admin Route] Media library browser.
#[utoipa::path(
    get,
    path = "/admin/api/storage",
    params(StorageQuery),
    responses(
        (status = 200, description = "Files in the folder", body = [StoredFile]),
        (status = 400, description = "Unknown folder")
    )
)]
pub async fn list_storage(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Query(query): Query<StorageQuery>,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;

    if !KNOWN_FOLDERS.contains(&query.folder.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Unknown folder. Expected one of: {}",
            KNOWN_FOLDERS.join(", ")
        )));
    }
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0);

    Ok(Json(backend.storage.list(&query.folder, limit, offset).await?))
}
