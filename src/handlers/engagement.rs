use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState, Backend,
    error::ApiError,
    guard::{self, ADMIN_ONLY, CONTENT_EDITORS, CONTENT_READERS},
    handlers::{require_text, validate_email},
    models::{
        Comment, CommentStatus, ContentKind, CreateCommentRequest, LikeActor, LikeRequest,
        LikeToggle, ModerateCommentRequest, NewComment, ViewCount,
    },
    session::SessionAccessor,
};

const MAX_COMMENT_CHARS: usize = 2000;
const MAX_GUEST_ID_CHARS: usize = 128;

async fn require_published_blog(backend: &Backend, blog_id: Uuid) -> Result<(), ApiError> {
    match backend.repo.get_content(ContentKind::Blogs, blog_id).await? {
        Some(blog) if blog.status.is_public() => Ok(()),
        _ => Err(ApiError::not_found("Blog not found")),
    }
}

/// record_view
///
/// [Public Route] Bumps a published blog's view counter through the atomic stored
/// function. If the function fails the request fails; the counter is never
/// read-modified-written from here.
#[utoipa::path(
    post,
    path = "/api/blogs/{id}/view",
    params(("id" = Uuid, Path, description = "Blog id")),
    responses(
        (status = 200, description = "New view count", body = ViewCount),
        (status = 404, description = "Unknown or unpublished blog")
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<ViewCount>, ApiError> {
    let backend = state.backend()?;
    require_published_blog(backend, blog_id).await?;
    let view_count = backend
        .repo
        .increment_view(blog_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog not found"))?;
    Ok(Json(ViewCount { view_count }))
}

/// toggle_like
///
/// [Public Route] Likes or unlikes a blog. Signed-in readers like as themselves
/// (an expired access token is refreshed first); anonymous readers must send a
/// stable `guest_id`.
#[utoipa::path(
    post,
    path = "/api/blogs/{id}/like",
    params(("id" = Uuid, Path, description = "Blog id")),
    request_body = LikeRequest,
    responses(
        (status = 200, description = "Toggled", body = LikeToggle),
        (status = 400, description = "No session and no guest id")
    )
)]
pub async fn toggle_like(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(blog_id): Path<Uuid>,
    payload: Option<Json<LikeRequest>>,
) -> Result<Json<LikeToggle>, ApiError> {
    let backend = state.backend()?;
    let auth = backend.auth.as_ref();

    let user = match session.session(auth) {
        Some(user) => Some(user),
        None => session.verified_user(auth).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "like: session verification failed, treating as guest");
            None
        }),
    };

    let actor = match user {
        Some(user) => LikeActor::User(user.id),
        None => {
            let guest_id = payload
                .and_then(|Json(body)| body.guest_id)
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ApiError::bad_request("guest_id is required when not signed in"))?;
            if guest_id.chars().count() > MAX_GUEST_ID_CHARS {
                return Err(ApiError::bad_request("guest_id is too long"));
            }
            LikeActor::Guest(guest_id)
        }
    };

    require_published_blog(backend, blog_id).await?;
    let toggled = backend.repo.toggle_like(blog_id, &actor).await?;
    Ok(Json(toggled))
}

/// list_blog_comments
///
/// [Public Route] Approved comments on a published blog.
#[utoipa::path(
    get,
    path = "/api/blogs/{id}/comments",
    params(("id" = Uuid, Path, description = "Blog id")),
    responses((status = 200, description = "Approved comments", body = [Comment]))
)]
pub async fn list_blog_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let backend = state.backend()?;
    require_published_blog(backend, blog_id).await?;
    let comments = backend
        .repo
        .list_comments(Some(blog_id), Some(CommentStatus::Approved))
        .await?;
    Ok(Json(comments))
}

/// add_comment
///
/// [Public Route] Stores a reader comment as `pending` until moderated.
#[utoipa::path(
    post,
    path = "/api/blogs/{id}/comments",
    params(("id" = Uuid, Path, description = "Blog id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Submitted for moderation", body = Comment),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let backend = state.backend()?;

    require_text(&payload.author_name, "Name")?;
    require_text(&payload.content, "Comment")?;
    if payload.content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::bad_request(format!(
            "Comment is too long. Maximum length is {} characters.",
            MAX_COMMENT_CHARS
        )));
    }
    let author_email = payload
        .author_email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    if let Some(email) = &author_email {
        validate_email(email)?;
    }

    require_published_blog(backend, blog_id).await?;
    let comment = backend
        .repo
        .create_comment(NewComment {
            blog_id,
            author_name: payload.author_name.trim().to_string(),
            author_email,
            content: payload.content.trim().to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// list_comments_admin
///
/// [Admin Route] Every comment, newest first, for the moderation queue.
#[utoipa::path(
    get,
    path = "/admin/api/comments",
    responses((status = 200, description = "All comments", body = [Comment]))
)]
pub async fn list_comments_admin(
    State(state): State<AppState>,
    mut session: SessionAccessor,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_READERS).await?;
    Ok(Json(backend.repo.list_comments(None, None).await?))
}

/// moderate_comment
///
/// [Admin Route] Approves or rejects a comment.
#[utoipa::path(
    patch,
    path = "/admin/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    request_body = ModerateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 404, description = "Not found")
    )
)]
pub async fn moderate_comment(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &CONTENT_EDITORS).await?;

    backend
        .repo
        .set_comment_status(id, payload.status)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Comment not found"))
}

/// delete_comment
///
/// [Admin Route] Permanently removes a comment.
#[utoipa::path(
    delete,
    path = "/admin/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let backend = state.backend()?;
    guard::authorize(backend, &state.config, &mut session, &ADMIN_ONLY).await?;

    if backend.repo.delete_comment(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Comment not found"))
    }
}
