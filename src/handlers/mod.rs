//! HTTP handlers, grouped by the area of the site they serve.
//!
//! Every data-touching handler follows the same order: `state.backend()?`
//! (configured?), then `guard::authorize` where the route is gated, then input
//! validation, then the store call.

pub mod applications;
pub mod content;
pub mod engagement;
pub mod pages;
pub mod session;
pub mod uploads;
pub mod users;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// PageQuery
///
/// Query parameters shared by paginated listings.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, capped at 100.
    pub limit: Option<i64>,
    /// Case-insensitive match on title and summary.
    pub search: Option<String>,
    pub category: Option<Uuid>,
}

impl PageQuery {
    /// Normalised `(page, limit, offset)`.
    pub fn window(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit, (page - 1) * limit)
    }
}

/// Slugs are lowercase ASCII words joined by single hyphens: `my-first-post`.
pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 200
        && slug
            .split('-')
            .all(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Invalid slug. Use lowercase letters, numbers and single hyphens.",
        ))
    }
}

pub fn require_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

/// A deliberately loose check; the auth service owns real address validation.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}
