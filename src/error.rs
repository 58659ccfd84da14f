use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the relational store or its stored functions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (for content tables: the slug).
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classifies a sqlx error, turning Postgres `unique_violation` (23505) into
    /// `Conflict` so callers can answer with a validation error.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Failures talking to the authentication service.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("auth service answered {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("service role key is not configured")]
    MissingServiceKey,
}

/// Failures talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),
}

/// ApiError
///
/// The HTTP boundary error. Every handler returns `Result<_, ApiError>`, so each
/// failure category lands on a stable status code and a JSON body of the form
/// `{"error": "...", "details": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Supabase not configured")]
    NotConfigured,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// Downstream failure. `details` carries the backend's own error text; the
    /// admin surface is privileged, so it is returned to the caller.
    #[error("{message}")]
    Store {
        message: String,
        details: Option<String>,
    },
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Forbidden".to_string())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let details = match &self {
            ApiError::Store { details, .. } => details.as_deref(),
            _ => None,
        };
        let body = ErrorBody {
            error: &message,
            details,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::bad_request("Slug already exists"),
            other => {
                tracing::error!(error = %other, "store operation failed");
                ApiError::Store {
                    message: "Database error".to_string(),
                    details: Some(other.to_string()),
                }
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        tracing::error!(error = %err, "auth service call failed");
        ApiError::Store {
            message: "Authentication service error".to_string(),
            details: Some(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "storage call failed");
        ApiError::Store {
            message: "Storage error".to_string(),
            details: Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_a_validation_error() {
        let err = ApiError::from(StoreError::Conflict("blogs_slug_key".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Slug already exists");
    }

    #[test]
    fn store_failure_keeps_details() {
        let err = ApiError::from(StoreError::Other("connection refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            ApiError::Store { message, details } => {
                assert_eq!(message, "Database error");
                assert_eq!(details.as_deref(), Some("connection refused"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn not_configured_is_a_server_error() {
        assert_eq!(
            ApiError::NotConfigured.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::NotConfigured.to_string(), "Supabase not configured");
    }
}
