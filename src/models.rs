use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Raised when a stored or submitted label is outside one of the closed sets below.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a closed,
/// lowercase-labelled enum. `TryFrom<String>` lets `FromRow` decode TEXT columns.
macro_rules! labelled_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($label => Ok($ty::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

// --- Authorization ---

/// Role
///
/// The closed set of authorization roles stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Editor,
    Author,
    User,
}

labelled_enum!(Role, "role", {
    Admin => "admin",
    Editor => "editor",
    Author => "author",
    User => "user",
});

/// Profile
///
/// The authorization record mirrored from `auth.users` into `public.profiles`.
/// `id` always equals the auth service's user identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub full_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a lazily provisioned profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

/// UpdateRoleRequest
///
/// Admin payload for PATCH /admin/api/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// --- Content ---

/// ContentKind
///
/// Every slugged content table managed through the admin console. All kinds share
/// one column layout; entity-specific fields travel in `metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContentKind {
    Blogs,
    Competitions,
    Events,
    Programmes,
    Publications,
    Categories,
    Tags,
}

labelled_enum!(ContentKind, "content kind", {
    Blogs => "blogs",
    Competitions => "competitions",
    Events => "events",
    Programmes => "programmes",
    Publications => "publications",
    Categories => "categories",
    Tags => "tags",
});

impl ContentKind {
    /// Backing table. Labels double as table names, so interpolating them into SQL
    /// never carries user input.
    pub fn table(self) -> &'static str {
        self.as_str()
    }

    /// Singular noun used in error messages ("Blog not found").
    pub fn noun(self) -> &'static str {
        match self {
            ContentKind::Blogs => "Blog",
            ContentKind::Competitions => "Competition",
            ContentKind::Events => "Event",
            ContentKind::Programmes => "Programme",
            ContentKind::Publications => "Publication",
            ContentKind::Categories => "Category",
            ContentKind::Tags => "Tag",
        }
    }
}

/// ContentStatus
///
/// Editorial state. Competitions use `open`/`closed` in place of `published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContentStatus {
    Draft,
    Published,
    Open,
    Closed,
    Archived,
}

labelled_enum!(ContentStatus, "content status", {
    Draft => "draft",
    Published => "published",
    Open => "open",
    Closed => "closed",
    Archived => "archived",
});

impl ContentStatus {
    /// Statuses visible on the public site.
    pub const PUBLIC: &'static [ContentStatus] =
        &[ContentStatus::Published, ContentStatus::Open, ContentStatus::Closed];

    pub fn is_public(self) -> bool {
        Self::PUBLIC.contains(&self)
    }
}

/// ContentEntry
///
/// One row of any content table, exactly as selected by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ContentEntry {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub cover_image: Option<String>,
    pub category_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub view_count: i64,
    pub like_count: i64,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateContentRequest
///
/// Input payload for POST /admin/api/content/{kind}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateContentRequest {
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    #[serde(default = "default_status")]
    pub status: ContentStatus,
    pub cover_image: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

fn default_status() -> ContentStatus {
    ContentStatus::Draft
}

/// UpdateContentRequest
///
/// Partial update payload for PUT /admin/api/content/{kind}/{id}; absent fields are kept,
/// and the nullable ones are cleared by an explicit `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Absent keeps the summary, `null` clears it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub summary: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ContentStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub cover_image: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schema(value_type = Option<Uuid>)]
    #[ts(type = "string | null")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// Repository-level filter for content listings.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    // `None` lists every status (admin); public routes pass `ContentStatus::PUBLIC`.
    pub statuses: Option<Vec<ContentStatus>>,
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// ContentPage
///
/// A page of content plus the total number of rows matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ContentPage {
    pub items: Vec<ContentEntry>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// --- Engagement ---

/// Who is toggling a like: a signed-in user or an anonymous browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeActor {
    User(Uuid),
    Guest(String),
}

/// LikeRequest
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LikeRequest {
    pub guest_id: Option<String>,
}

/// LikeToggle
///
/// Result of the `toggle_blog_like` stored function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct LikeToggle {
    pub is_liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ViewCount {
    pub view_count: i64,
}

/// CommentStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

labelled_enum!(CommentStatus, "comment status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Comment
///
/// A reader comment on a blog post. New comments wait in `pending` for moderation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub author_name: String,
    pub author_email: Option<String>,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub status: CommentStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub author_name: String,
    pub author_email: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog_id: Uuid,
    pub author_name: String,
    pub author_email: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ModerateCommentRequest {
    pub status: CommentStatus,
}

// --- Competition applications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

labelled_enum!(ApplicationStatus, "application status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

/// Application
///
/// A submission to a competition, optionally pointing at an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Application {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub attachment_path: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CreateApplicationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateApplicationRequest {
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub attachment_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub competition_id: Uuid,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub attachment_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateApplicationRequest {
    pub status: ApplicationStatus,
}

// --- Storage ---

/// StoredObject
///
/// Returned by every upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

/// StoredFile
///
/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StoredFile {
    pub path: String,
    pub size: i64,
    pub public_url: String,
    #[ts(type = "string | null")]
    pub last_modified: Option<DateTime<Utc>>,
}

// --- Sessions ---

/// LoginRequest
///
/// Payload for POST /auth/login. The password is forwarded to the auth service and
/// never stored or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// --- Dashboard ---

/// DashboardStats
///
/// Output schema for GET /admin/api/stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardStats {
    pub blogs: i64,
    pub competitions: i64,
    pub events: i64,
    pub programmes: i64,
    pub publications: i64,
    pub pending_applications: i64,
    pub pending_comments: i64,
    pub users: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back_to_their_variant() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(*role));
        }
        for kind in ContentKind::ALL {
            assert_eq!(kind.table().parse::<ContentKind>(), Ok(*kind));
        }
    }

    #[test]
    fn unknown_label_names_the_set() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role `superuser`");
    }

    #[test]
    fn competitions_stay_public_once_closed() {
        assert!(ContentStatus::Closed.is_public());
        assert!(!ContentStatus::Draft.is_public());
        assert!(!ContentStatus::Archived.is_public());
    }

    #[test]
    fn create_request_defaults_to_draft() {
        let request: CreateContentRequest =
            serde_json::from_str(r#"{"title":"Hi","slug":"hi"}"#).unwrap();
        assert_eq!(request.status, ContentStatus::Draft);
        assert!(request.metadata.is_null());
    }

    #[test]
    fn update_request_tells_null_from_absent() {
        let request: UpdateContentRequest =
            serde_json::from_str(r#"{"summary":null,"cover_image":"a.png"}"#).unwrap();
        assert_eq!(request.summary, Some(None));
        assert_eq!(request.cover_image, Some(Some("a.png".to_string())));
        assert_eq!(request.category_id, None);
    }
}
