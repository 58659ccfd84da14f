#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Response};
use chrono::Utc;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;
use youth_site_backend::{
    AppConfig, AppState, Backend, MockAuthService, MockStorageService, create_router,
    auth::{AuthIdentity, AuthState, SessionTokens},
    error::StoreError,
    models::{
        Application, ApplicationStatus, Comment, CommentStatus, ContentEntry, ContentKind,
        ContentQuery, ContentStatus, CreateContentRequest, DashboardStats, LikeActor, LikeToggle,
        NewApplication, NewComment, NewProfile, Profile, Role, UpdateContentRequest,
    },
    repository::{Repository, RepositoryState},
    storage::StorageState,
};

// --- In-memory repository ---

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    content: HashMap<ContentKind, Vec<ContentEntry>>,
    likes: HashSet<(Uuid, String)>,
    comments: Vec<Comment>,
    applications: Vec<Application>,
}

/// InMemoryRepository
///
/// Behaves like the Postgres schema where it matters to handlers: slugs are
/// unique per kind (violations are `StoreError::Conflict`), profile inserts are
/// insert-if-absent, and the view/like functions are atomic under the lock.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    /// When true, every call fails like an unreachable database.
    pub fail_all: bool,
    profile_inserts: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryRepository {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_all {
            return Err(StoreError::Other("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn seed_profile(&self, id: Uuid, role: Role) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id,
            email: Some(format!("{}@example.org", id.simple())),
            role,
            full_name: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.tables).profiles.insert(id, profile.clone());
        profile
    }

    pub fn seed_content(&self, kind: ContentKind, slug: &str, status: ContentStatus) -> ContentEntry {
        let now = Utc::now();
        let entry = ContentEntry {
            id: Uuid::new_v4(),
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            summary: None,
            body: None,
            status,
            cover_image: None,
            category_id: None,
            metadata: serde_json::json!({}),
            view_count: 0,
            like_count: 0,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.tables)
            .content
            .entry(kind)
            .or_default()
            .push(entry.clone());
        entry
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        lock(&self.tables).profiles.get(&id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        lock(&self.tables).profiles.len()
    }

    /// Number of insert attempts that actually created a row.
    pub fn profile_inserts(&self) -> usize {
        *lock(&self.profile_inserts)
    }

    pub fn content(&self, kind: ContentKind) -> Vec<ContentEntry> {
        lock(&self.tables).content.get(&kind).cloned().unwrap_or_default()
    }

    pub fn comments(&self) -> Vec<Comment> {
        lock(&self.tables).comments.clone()
    }

    pub fn applications(&self) -> Vec<Application> {
        lock(&self.tables).applications.clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables).profiles.get(&id).cloned())
    }

    async fn insert_profile_if_absent(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        if let Some(existing) = tables.profiles.get(&profile.id) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let row = Profile {
            id: profile.id,
            email: profile.email,
            role: profile.role,
            full_name: None,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(row.id, row.clone());
        *lock(&self.profile_inserts) += 1;
        Ok(row)
    }

    async fn update_profile_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        Ok(tables.profiles.get_mut(&id).map(|profile| {
            profile.role = role;
            profile.updated_at = Utc::now();
            profile.clone()
        }))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.check()?;
        let mut profiles: Vec<Profile> = lock(&self.tables).profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn delete_profile(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        Ok(lock(&self.tables).profiles.remove(&id).is_some())
    }

    async fn list_content(
        &self,
        kind: ContentKind,
        query: &ContentQuery,
    ) -> Result<(Vec<ContentEntry>, i64), StoreError> {
        self.check()?;
        let tables = lock(&self.tables);
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<ContentEntry> = tables
            .content
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|e| {
                        query
                            .statuses
                            .as_ref()
                            .is_none_or(|allowed| allowed.contains(&e.status))
                    })
                    .filter(|e| query.category_id.is_none_or(|c| e.category_id == Some(c)))
                    .filter(|e| {
                        needle.as_ref().is_none_or(|n| {
                            e.title.to_lowercase().contains(n)
                                || e.summary.as_ref().is_some_and(|s| s.to_lowercase().contains(n))
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }

    async fn get_content(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentEntry>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .content
            .get(&kind)
            .and_then(|rows| rows.iter().find(|e| e.id == id).cloned()))
    }

    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentEntry>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .content
            .get(&kind)
            .and_then(|rows| rows.iter().find(|e| e.slug == slug).cloned()))
    }

    async fn slug_exists(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        self.check()?;
        Ok(lock(&self.tables).content.get(&kind).is_some_and(|rows| {
            rows.iter()
                .any(|e| e.slug == slug && Some(e.id) != exclude)
        }))
    }

    async fn create_content(
        &self,
        kind: ContentKind,
        input: &CreateContentRequest,
        author: Uuid,
    ) -> Result<ContentEntry, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        let rows = tables.content.entry(kind).or_default();
        if rows.iter().any(|e| e.slug == input.slug) {
            return Err(StoreError::Conflict(format!("{}_slug_key", kind.table())));
        }
        let now = Utc::now();
        let entry = ContentEntry {
            id: Uuid::new_v4(),
            title: input.title.clone(),
            slug: input.slug.clone(),
            summary: input.summary.clone(),
            body: input.body.clone(),
            status: input.status,
            cover_image: input.cover_image.clone(),
            category_id: input.category_id,
            metadata: input.metadata.clone(),
            view_count: 0,
            like_count: 0,
            created_by: Some(author),
            updated_by: Some(author),
            created_at: now,
            updated_at: now,
        };
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn update_content(
        &self,
        kind: ContentKind,
        id: Uuid,
        input: &UpdateContentRequest,
        editor: Uuid,
    ) -> Result<Option<ContentEntry>, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        let rows = tables.content.entry(kind).or_default();
        if let Some(slug) = &input.slug {
            if rows.iter().any(|e| &e.slug == slug && e.id != id) {
                return Err(StoreError::Conflict(format!("{}_slug_key", kind.table())));
            }
        }
        Ok(rows.iter_mut().find(|e| e.id == id).map(|entry| {
            if let Some(title) = &input.title {
                entry.title = title.clone();
            }
            if let Some(slug) = &input.slug {
                entry.slug = slug.clone();
            }
            if let Some(summary) = &input.summary {
                entry.summary = summary.clone();
            }
            if let Some(body) = &input.body {
                entry.body = Some(body.clone());
            }
            if let Some(status) = input.status {
                entry.status = status;
            }
            if let Some(cover) = &input.cover_image {
                entry.cover_image = cover.clone();
            }
            if let Some(category) = input.category_id {
                entry.category_id = category;
            }
            if let Some(metadata) = &input.metadata {
                entry.metadata = metadata.clone();
            }
            entry.updated_by = Some(editor);
            entry.updated_at = Utc::now();
            entry.clone()
        }))
    }

    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        let rows = tables.content.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|e| e.id != id);
        Ok(rows.len() != before)
    }

    async fn increment_view(&self, blog_id: Uuid) -> Result<Option<i64>, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        Ok(tables
            .content
            .get_mut(&ContentKind::Blogs)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|e| e.id == blog_id && e.status.is_public())
            })
            .map(|blog| {
                blog.view_count += 1;
                blog.view_count
            }))
    }

    async fn toggle_like(&self, blog_id: Uuid, actor: &LikeActor) -> Result<LikeToggle, StoreError> {
        self.check()?;
        let key = match actor {
            LikeActor::User(id) => format!("user:{}", id),
            LikeActor::Guest(guest) => format!("guest:{}", guest),
        };
        let mut tables = lock(&self.tables);
        let is_liked = if tables.likes.remove(&(blog_id, key.clone())) {
            false
        } else {
            tables.likes.insert((blog_id, key));
            true
        };
        let like_count = tables.likes.iter().filter(|(id, _)| *id == blog_id).count();
        let like_count = i64::try_from(like_count).unwrap_or(i64::MAX);
        if let Some(blog) = tables
            .content
            .get_mut(&ContentKind::Blogs)
            .and_then(|rows| rows.iter_mut().find(|e| e.id == blog_id))
        {
            blog.like_count = like_count;
        }
        Ok(LikeToggle {
            is_liked,
            like_count,
        })
    }

    async fn list_comments(
        &self,
        blog_id: Option<Uuid>,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .comments
            .iter()
            .filter(|c| blog_id.is_none_or(|b| c.blog_id == b))
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        self.check()?;
        let row = Comment {
            id: Uuid::new_v4(),
            blog_id: comment.blog_id,
            author_name: comment.author_name,
            author_email: comment.author_email,
            content: comment.content,
            status: CommentStatus::Pending,
            created_at: Utc::now(),
        };
        lock(&self.tables).comments.push(row.clone());
        Ok(row)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Option<Comment>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .map(|c| {
                c.status = status;
                c.clone()
            }))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = lock(&self.tables);
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application, StoreError> {
        self.check()?;
        let row = Application {
            id: Uuid::new_v4(),
            competition_id: application.competition_id,
            applicant_name: application.applicant_name,
            email: application.email,
            phone: application.phone,
            message: application.message,
            attachment_path: application.attachment_path,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };
        lock(&self.tables).applications.push(row.clone());
        Ok(row)
    }

    async fn list_applications(
        &self,
        competition_id: Option<Uuid>,
    ) -> Result<Vec<Application>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .applications
            .iter()
            .filter(|a| competition_id.is_none_or(|c| a.competition_id == c))
            .cloned()
            .collect())
    }

    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError> {
        self.check()?;
        Ok(lock(&self.tables)
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .map(|a| {
                a.status = status;
                a.clone()
            }))
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        self.check()?;
        let tables = lock(&self.tables);
        let count = |kind: ContentKind| {
            i64::try_from(tables.content.get(&kind).map_or(0, Vec::len)).unwrap_or(i64::MAX)
        };
        Ok(DashboardStats {
            blogs: count(ContentKind::Blogs),
            competitions: count(ContentKind::Competitions),
            events: count(ContentKind::Events),
            programmes: count(ContentKind::Programmes),
            publications: count(ContentKind::Publications),
            pending_applications: tables
                .applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::Pending)
                .count() as i64,
            pending_comments: tables
                .comments
                .iter()
                .filter(|c| c.status == CommentStatus::Pending)
                .count() as i64,
            users: tables.profiles.len() as i64,
        })
    }
}

// --- App builders ---

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub auth: Arc<MockAuthService>,
    pub storage: Arc<MockStorageService>,
}

pub fn test_app(auth: MockAuthService) -> TestApp {
    test_app_with(AppConfig::default(), auth, InMemoryRepository::default())
}

pub fn test_app_with(config: AppConfig, auth: MockAuthService, repo: InMemoryRepository) -> TestApp {
    build(config, auth, repo, MockStorageService::new())
}

/// App whose object storage rejects every call.
pub fn failing_storage_app(auth: MockAuthService) -> TestApp {
    build(
        AppConfig::default(),
        auth,
        InMemoryRepository::default(),
        MockStorageService::new_failing(),
    )
}

fn build(
    config: AppConfig,
    auth: MockAuthService,
    repo: InMemoryRepository,
    storage: MockStorageService,
) -> TestApp {
    let repo = Arc::new(repo);
    let auth = Arc::new(auth);
    let storage = Arc::new(storage);

    let backend = Backend {
        repo: repo.clone() as RepositoryState,
        auth: auth.clone() as AuthState,
        storage: storage.clone() as StorageState,
    };
    let router = create_router(AppState {
        config,
        backend: Some(backend),
    });

    TestApp {
        router,
        repo,
        auth,
        storage,
    }
}

/// Router with no platform behind it (development no-op mode).
pub fn unconfigured_app() -> Router {
    let config = AppConfig {
        supabase: None,
        ..AppConfig::default()
    };
    create_router(AppState {
        config,
        backend: None,
    })
}

// --- Identities and cookies ---

pub fn identity(id: Uuid) -> AuthIdentity {
    AuthIdentity {
        id,
        email: Some(format!("{}@example.org", id.simple())),
    }
}

pub fn tokens(access: &str, refresh: &str) -> SessionTokens {
    SessionTokens {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }
}

/// `Cookie` header carrying a session.
pub fn session_cookie(access: &str) -> String {
    format!("sb-access-token={}", access)
}

pub fn session_cookies(access: &str, refresh: &str) -> String {
    format!("sb-access-token={}; sb-refresh-token={}", access, refresh)
}

/// A signed-in caller with an existing profile of `role`. Returns the app and
/// the cookie header to send.
pub fn signed_in(role: Role) -> (TestApp, Uuid, String) {
    let user_id = Uuid::new_v4();
    let app = test_app(MockAuthService::new().with_session("access-1", identity(user_id)));
    app.repo.seed_profile(user_id, role);
    (app, user_id, session_cookie("access-1"))
}

// --- Response helpers ---

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}
