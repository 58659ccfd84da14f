use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{
        Application, ApplicationStatus, Comment, CommentStatus, ContentEntry, ContentKind,
        ContentQuery, CreateContentRequest, DashboardStats, LikeActor, LikeToggle, NewApplication,
        NewComment, NewProfile, Profile, Role, UpdateContentRequest,
    },
};

/// Repository Trait
///
/// Contract for every persistence operation. Handlers and the guard only see this
/// trait, so tests swap in an in-memory implementation.
///
/// Errors are returned, never swallowed: a failed query must reach the caller as a
/// store error, not as an empty result.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;
    /// Inserts unless a row with the same id exists; returns the stored row either way.
    async fn insert_profile_if_absent(&self, profile: NewProfile) -> Result<Profile, StoreError>;
    async fn update_profile_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, StoreError>;
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
    async fn delete_profile(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Content ---
    async fn list_content(
        &self,
        kind: ContentKind,
        query: &ContentQuery,
    ) -> Result<(Vec<ContentEntry>, i64), StoreError>;
    async fn get_content(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentEntry>, StoreError>;
    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentEntry>, StoreError>;
    /// Advisory uniqueness check. `exclude` skips the record being updated.
    async fn slug_exists(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError>;
    async fn create_content(
        &self,
        kind: ContentKind,
        input: &CreateContentRequest,
        author: Uuid,
    ) -> Result<ContentEntry, StoreError>;
    async fn update_content(
        &self,
        kind: ContentKind,
        id: Uuid,
        input: &UpdateContentRequest,
        editor: Uuid,
    ) -> Result<Option<ContentEntry>, StoreError>;
    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError>;

    // --- Engagement (server-side atomic functions) ---
    /// `None` when the blog does not exist.
    async fn increment_view(&self, blog_id: Uuid) -> Result<Option<i64>, StoreError>;
    async fn toggle_like(&self, blog_id: Uuid, actor: &LikeActor) -> Result<LikeToggle, StoreError>;

    // --- Comments ---
    async fn list_comments(
        &self,
        blog_id: Option<Uuid>,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, StoreError>;
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;
    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Option<Comment>, StoreError>;
    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Competition applications ---
    async fn create_application(&self, application: NewApplication) -> Result<Application, StoreError>;
    async fn list_applications(
        &self,
        competition_id: Option<Uuid>,
    ) -> Result<Vec<Application>, StoreError>;
    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError>;

    // --- Dashboard ---
    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const PROFILE_COLUMNS: &str = "id, email, role, full_name, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, title, slug, summary, body, status, cover_image, category_id, \
     metadata, view_count, like_count, created_by, updated_by, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, blog_id, author_name, author_email, content, status, created_at";

const APPLICATION_COLUMNS: &str = "id, competition_id, applicant_name, email, phone, message, \
     attachment_path, status, created_at";

/// PostgresRepository
///
/// `Repository` backed by the Supabase Postgres instance.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the WHERE clause shared by the list and count queries.
fn push_content_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ContentQuery) {
    builder.push(" WHERE true");
    if let Some(statuses) = &query.statuses {
        let labels: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        builder.push(" AND status = ANY(");
        builder.push_bind(labels);
        builder.push(")");
    }
    if let Some(category_id) = query.category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR summary ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_profile_if_absent(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        sqlx::query(
            "INSERT INTO profiles (id, email, role) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        self.get_profile(profile.id)
            .await?
            .ok_or_else(|| StoreError::Other(format!("profile {} missing after insert", profile.id)))
    }

    async fn update_profile_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, StoreError> {
        sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_profile(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Builds the filtered page and its total count with `QueryBuilder`, keeping
    /// every user-supplied value a bound parameter.
    async fn list_content(
        &self,
        kind: ContentKind,
        query: &ContentQuery,
    ) -> Result<(Vec<ContentEntry>, i64), StoreError> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", kind.table()));
        push_content_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        let mut list: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CONTENT_COLUMNS} FROM {}", kind.table()));
        push_content_filters(&mut list, query);
        list.push(" ORDER BY created_at DESC LIMIT ");
        list.push_bind(query.limit);
        list.push(" OFFSET ");
        list.push_bind(query.offset);

        let items = list
            .build_query_as::<ContentEntry>()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok((items, total))
    }

    async fn get_content(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentEntry>, StoreError> {
        sqlx::query_as::<_, ContentEntry>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM {} WHERE id = $1",
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentEntry>, StoreError> {
        sqlx::query_as::<_, ContentEntry>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM {} WHERE slug = $1",
            kind.table()
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn slug_exists(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
            kind.table()
        ))
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn create_content(
        &self,
        kind: ContentKind,
        input: &CreateContentRequest,
        author: Uuid,
    ) -> Result<ContentEntry, StoreError> {
        sqlx::query_as::<_, ContentEntry>(&format!(
            "INSERT INTO {} (title, slug, summary, body, status, cover_image, category_id, metadata, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING {CONTENT_COLUMNS}",
            kind.table()
        ))
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(&input.body)
        .bind(input.status.as_str())
        .bind(&input.cover_image)
        .bind(input.category_id)
        .bind(&input.metadata)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Partial update: COALESCE keeps every column the request leaves out; the
    /// nullable columns take a presence flag so `null` can clear them.
    async fn update_content(
        &self,
        kind: ContentKind,
        id: Uuid,
        input: &UpdateContentRequest,
        editor: Uuid,
    ) -> Result<Option<ContentEntry>, StoreError> {
        sqlx::query_as::<_, ContentEntry>(&format!(
            "UPDATE {} SET \
                title = COALESCE($2, title), \
                slug = COALESCE($3, slug), \
                summary = CASE WHEN $11 THEN $4 ELSE summary END, \
                body = COALESCE($5, body), \
                status = COALESCE($6, status), \
                cover_image = CASE WHEN $12 THEN $7 ELSE cover_image END, \
                category_id = CASE WHEN $13 THEN $8 ELSE category_id END, \
                metadata = COALESCE($9, metadata), \
                updated_by = $10, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {CONTENT_COLUMNS}",
            kind.table()
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(input.summary.clone().flatten())
        .bind(&input.body)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.cover_image.clone().flatten())
        .bind(input.category_id.flatten())
        .bind(&input.metadata)
        .bind(editor)
        .bind(input.summary.is_some())
        .bind(input.cover_image.is_some())
        .bind(input.category_id.is_some())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Calls `increment_blog_view`; there is deliberately no read-then-write
    /// fallback when the function fails.
    async fn increment_view(&self, blog_id: Uuid) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT increment_blog_view($1)")
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn toggle_like(&self, blog_id: Uuid, actor: &LikeActor) -> Result<LikeToggle, StoreError> {
        let (user_id, guest_id) = match actor {
            LikeActor::User(id) => (Some(*id), None),
            LikeActor::Guest(guest) => (None, Some(guest.as_str())),
        };
        sqlx::query_as::<_, LikeToggle>(
            "SELECT is_liked, like_count FROM toggle_blog_like($1, $2, $3)",
        )
        .bind(blog_id)
        .bind(user_id)
        .bind(guest_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_comments(
        &self,
        blog_id: Option<Uuid>,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE ($1::uuid IS NULL OR blog_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(blog_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (blog_id, author_name, author_email, content, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.blog_id)
        .bind(&comment.author_name)
        .bind(&comment.author_email)
        .bind(&comment.content)
        .bind(CommentStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Option<Comment>, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET status = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application, StoreError> {
        sqlx::query_as::<_, Application>(&format!(
            "INSERT INTO applications (competition_id, applicant_name, email, phone, message, attachment_path, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(application.competition_id)
        .bind(&application.applicant_name)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.message)
        .bind(&application.attachment_path)
        .bind(ApplicationStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_applications(
        &self,
        competition_id: Option<Uuid>,
    ) -> Result<Vec<Application>, StoreError> {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications \
             WHERE ($1::uuid IS NULL OR competition_id = $1) ORDER BY created_at DESC"
        ))
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError> {
        sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications SET status = $2 WHERE id = $1 RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM blogs),
                (SELECT COUNT(*) FROM competitions),
                (SELECT COUNT(*) FROM events),
                (SELECT COUNT(*) FROM programmes),
                (SELECT COUNT(*) FROM publications),
                (SELECT COUNT(*) FROM applications WHERE status = 'pending'),
                (SELECT COUNT(*) FROM comments WHERE status = 'pending'),
                (SELECT COUNT(*) FROM profiles)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(DashboardStats {
            blogs: row.0,
            competitions: row.1,
            events: row.2,
            programmes: row.3,
            publications: row.4,
            pending_applications: row.5,
            pending_comments: row.6,
            users: row.7,
        })
    }
}
