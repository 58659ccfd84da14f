use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::ApiError,
    handlers::{require_text, validate_email},
    models::{LoginRequest, LoginResponse},
    session::SessionAccessor,
};

/// login
///
/// Password sign-in. On success the token pair is stored in HTTP-only cookies;
/// the tokens themselves never appear in the body.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, session cookies set", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Platform not configured")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    mut session: SessionAccessor,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let backend = state.backend()?;

    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;
    require_text(&payload.password, "Password")?;

    let Some((tokens, identity)) = backend
        .auth
        .sign_in_with_password(&email, &payload.password)
        .await?
    else {
        tracing::info!("sign-in rejected");
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };
    tracing::info!(user_id = %identity.id, "signed in");

    session.store(tokens);
    Ok(Json(LoginResponse {
        user_id: identity.id,
        email: identity.email,
    }))
}

/// logout
///
/// Revokes the session upstream when possible and always clears the cookies.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Signed out, session cookies cleared"))
)]
pub async fn logout(State(state): State<AppState>, mut session: SessionAccessor) -> StatusCode {
    if let (Some(backend), Some(tokens)) = (state.backend.as_ref(), session.tokens()) {
        if !tokens.access_token.is_empty() {
            if let Err(err) = backend.auth.sign_out(&tokens.access_token).await {
                tracing::warn!(error = %err, "upstream sign-out failed, clearing cookies anyway");
            }
        }
    }

    session.clear();
    StatusCode::NO_CONTENT
}
