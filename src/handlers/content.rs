use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    guard::{self, ADMIN_ONLY, CONTENT_EDITORS, CONTENT_READERS},
    handlers::{PageQuery, require_text, validate_slug},
    models::{ContentEntry, ContentKind, ContentPage, ContentQuery, ContentStatus, CreateContentRequest, UpdateContentRequest},
    session::SessionAccessor,
};

fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown content type: {}", raw)))
}

fn content_query(page: &PageQuery, statuses: Option<Vec<ContentStatus>>) -> ContentQuery {
    let (_, limit, offset) = page.window();
    ContentQuery {
        statuses,
        search: page.search.clone(),
        category_id: page.category,
        limit,
        offset,
    }
}

// --- Public site ---

/// list_public_content
///
/// [Public Route] Published entries of one kind, newest first.
#[utoipa::path(
    get,
    path = "/api/content/{kind}",
    params(("kind" = String, Path, description = "Content kind, e.g. blogs"), PageQuery),
    responses((status = 200, description = "Published entries", body = ContentPage))
)]
pub async fn list_public_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ContentPage>, ApiError> {
    let backend = state.backend()?;
    let kind = parse_kind(&kind)?;
    let (page_number, limit, _) = page.window();

    let query = content_query(&page, Some(ContentStatus::PUBLIC.to_vec()));
    let (items, total) = backend.repo.list_content(kind, &query).await?;

    Ok(Json(ContentPage {
        items,
        total,
        page: page_number,
        limit,
    }))
}

/// get_public_content
///
/// [Public Route] One published entry by slug. Drafts answer 404, exactly like
/// missing slugs.
#[utoipa::path(
    get,
    path = "/api/content/{kind}/{slug}",
    params(
        ("kind" = String, Path, description = "Content kind"),
        ("slug" = String, Path, description = "Entry slug")
    ),
    responses(
        (status = 200, description = "Found", body = ContentEntry),
        (status = 404, description = "Not found or not published")
    )
)]
pub async fn get_public_content(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
) -> Result<Json<ContentEntry>, ApiError> {
    let backend = state.backend()?;
    let kind = parse_kind(&kind)?;

    backend
        .repo
        .get_content_by_slug(kind, &slug)
        .await?
        .filter(|entry| entry.status.is_public())
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.noun())))
}

// --- Admin console ---

/// list_admin_content
///
/// [Admin Route] Every entry of one kind regardless of status.
#[utoipa::path(
    get,
    path = "/admin/api/content/{kind}",
    params(("kind" = String, Path, description = "Content kind"), PageQuery),
    responses(
        (status = 200, description = "All entries", body = ContentPage),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Insufficient role")
    )
)]
pub async fn list_admin_content(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(kind): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ContentPage>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_READERS).await?;
    let kind = parse_kind(&kind)?;
    let (page_number, limit, _) = page.window();

    let (items, total) = backend
        .repo
        .list_content(kind, &content_query(&page, None))
        .await?;

    Ok(Json(ContentPage {
        items,
        total,
        page: page_number,
        limit,
    }))
}

/// get_admin_content
///
/// [Admin Route] One entry by id, drafts included.
#[utoipa::path(
    get,
    path = "/admin/api/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Content kind"),
        ("id" = Uuid, Path, description = "Entry id")
    ),
    responses((status = 200, description = "Found", body = ContentEntry))
)]
pub async fn get_admin_content(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<ContentEntry>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_READERS).await?;
    let kind = parse_kind(&kind)?;

    backend
        .repo
        .get_content(kind, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.noun())))
}

/// create_content
///
/// [Admin Route] Creates an entry after the advisory slug check. Two concurrent
/// creators can both pass the check; the table's unique constraint then rejects
/// the loser, which also surfaces as "Slug already exists".
#[utoipa::path(
    post,
    path = "/admin/api/content/{kind}",
    params(("kind" = String, Path, description = "Content kind")),
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Created", body = ContentEntry),
        (status = 400, description = "Validation failure or duplicate slug")
    )
)]
pub async fn create_content(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(kind): Path<String>,
    Json(mut payload): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<ContentEntry>), ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;
    let kind = parse_kind(&kind)?;

    require_text(&payload.title, "Title")?;
    payload.slug = payload.slug.trim().to_string();
    validate_slug(&payload.slug)?;
    if payload.metadata.is_null() {
        payload.metadata = serde_json::json!({});
    }

    if backend.repo.slug_exists(kind, &payload.slug, None).await? {
        return Err(ApiError::bad_request("Slug already exists"));
    }

    let entry = backend
        .repo
        .create_content(kind, &payload, caller.user_id)
        .await?;
    tracing::info!(kind = %kind, id = %entry.id, slug = %entry.slug, by = %caller.user_id, "content created");

    Ok((StatusCode::CREATED, Json(entry)))
}

/// update_content
///
/// [Admin Route] Partial update. The slug check excludes the entry itself, so
/// resubmitting an unchanged slug succeeds.
#[utoipa::path(
    put,
    path = "/admin/api/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Content kind"),
        ("id" = Uuid, Path, description = "Entry id")
    ),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Updated", body = ContentEntry),
        (status = 400, description = "Validation failure or duplicate slug"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_content(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(mut payload): Json<UpdateContentRequest>,
) -> Result<Json<ContentEntry>, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;
    let kind = parse_kind(&kind)?;

    if backend.repo.get_content(kind, id).await?.is_none() {
        return Err(ApiError::not_found(format!("{} not found", kind.noun())));
    }

    if let Some(title) = &payload.title {
        require_text(title, "Title")?;
    }
    if let Some(slug) = payload.slug.as_mut() {
        *slug = slug.trim().to_string();
        validate_slug(slug)?;
        if backend.repo.slug_exists(kind, slug, Some(id)).await? {
            return Err(ApiError::bad_request("Slug already exists"));
        }
    }

    let entry = backend
        .repo
        .update_content(kind, id, &payload, caller.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.noun())))?;
    tracing::info!(kind = %kind, id = %entry.id, by = %caller.user_id, "content updated");

    Ok(Json(entry))
}

/// delete_content
///
/// [Admin Route] Destructive, so admin only.
#[utoipa::path(
    delete,
    path = "/admin/api/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Content kind"),
        ("id" = Uuid, Path, description = "Entry id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_content(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let backend = state.backend()?;
    let caller = guard::authorize(backend, &state.config, &mut session, &ADMIN_ONLY).await?;
    let kind = parse_kind(&kind)?;

    if backend.repo.delete_content(kind, id).await? {
        tracing::info!(kind = %kind, id = %id, by = %caller.user_id, "content deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("{} not found", kind.noun())))
    }
}
