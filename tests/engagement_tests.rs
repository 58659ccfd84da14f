mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use serde_json::{Value, json};
use tower::util::ServiceExt;
use uuid::Uuid;
use youth_site_backend::{
    MockAuthService,
    models::{CommentStatus, ContentKind, ContentStatus, Role},
};

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn views_increment_atomically() {
    let app = test_app(MockAuthService::new());
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);
    let uri = format!("/api/blogs/{}/view", blog.id);

    let first = app.router.clone().oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(body_json(first).await["view_count"], 1);

    let second = app.router.oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(body_json(second).await["view_count"], 2);
}

#[tokio::test]
async fn viewing_an_unknown_blog_is_404() {
    let app = test_app(MockAuthService::new());

    let response = app
        .router
        .oneshot(post_empty(&format!("/api/blogs/{}/view", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unpublished_blogs_do_not_count_views() {
    let app = test_app(MockAuthService::new());
    let draft = app
        .repo
        .seed_content(ContentKind::Blogs, "draft", ContentStatus::Draft);
    let archived = app
        .repo
        .seed_content(ContentKind::Blogs, "old", ContentStatus::Archived);

    for blog in [&draft, &archived] {
        let response = app
            .router
            .clone()
            .oneshot(post_empty(&format!("/api/blogs/{}/view", blog.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Blog not found");
    }

    let stored = app.repo.content(ContentKind::Blogs);
    assert!(stored.iter().all(|entry| entry.view_count == 0));
}

#[tokio::test]
async fn guest_like_toggles() {
    let app = test_app(MockAuthService::new());
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);
    let uri = format!("/api/blogs/{}/like", blog.id);

    let liked = app
        .router
        .clone()
        .oneshot(post_json(&uri, json!({ "guest_id": "browser-1" })))
        .await
        .unwrap();
    assert_eq!(liked.status(), StatusCode::OK);
    assert_eq!(body_json(liked).await, json!({ "is_liked": true, "like_count": 1 }));

    let unliked = app
        .router
        .oneshot(post_json(&uri, json!({ "guest_id": "browser-1" })))
        .await
        .unwrap();
    assert_eq!(body_json(unliked).await, json!({ "is_liked": false, "like_count": 0 }));
}

#[tokio::test]
async fn anonymous_like_without_guest_id_is_rejected() {
    let app = test_app(MockAuthService::new());
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);

    let response = app
        .router
        .oneshot(post_json(&format!("/api/blogs/{}/like", blog.id), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_in_like_counts_once_per_user() {
    let user = Uuid::new_v4();
    let app = test_app(MockAuthService::new().with_session("access-1", identity(user)));
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);
    let uri = format!("/api/blogs/{}/like", blog.id);

    let request = |guest: &str| {
        Request::builder()
            .method("POST")
            .uri(&uri)
            .header(header::COOKIE, session_cookie("access-1"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "guest_id": guest }).to_string()))
            .unwrap()
    };

    let first = app.router.clone().oneshot(request("a")).await.unwrap();
    assert_eq!(body_json(first).await["is_liked"], true);

    // A different guest id does not make the signed-in user a new liker.
    let second = app.router.oneshot(request("b")).await.unwrap();
    assert_eq!(body_json(second).await, json!({ "is_liked": false, "like_count": 0 }));
}

#[tokio::test]
async fn expired_session_is_refreshed_before_liking() {
    let user = Uuid::new_v4();
    let auth = MockAuthService::new().with_refresh(
        "refresh-old",
        tokens("access-new", "refresh-new"),
        identity(user),
    );
    let app = test_app(auth);
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/blogs/{}/like", blog.id))
                .header(header::COOKIE, session_cookies("access-expired", "refresh-old"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("sb-access-token=access-new;")));
    assert!(cookies.iter().any(|c| c.starts_with("sb-refresh-token=refresh-new;")));
    assert_eq!(body_json(response).await, json!({ "is_liked": true, "like_count": 1 }));
}

#[tokio::test]
async fn comments_wait_for_moderation() {
    let (app, _, cookie) = signed_in(Role::Editor);
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);
    let uri = format!("/api/blogs/{}/comments", blog.id);

    let created = app
        .router
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "author_name": "Ama", "author_email": "ama@example.org", "content": "Great read" }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let comment = body_json(created).await;
    assert_eq!(comment["status"], "pending");

    let before = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(before).await, json!([]));

    let moderated = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/admin/api/comments/{}", comment["id"].as_str().unwrap()))
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"status":"approved"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(moderated.status(), StatusCode::OK);

    let after = app
        .router
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let listed = body_json(after).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(app.repo.comments()[0].status, CommentStatus::Approved);
}

#[tokio::test]
async fn comments_on_drafts_are_refused() {
    let app = test_app(MockAuthService::new());
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "secret", ContentStatus::Draft);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/blogs/{}/comments", blog.id),
            json!({ "author_name": "Ama", "content": "Hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.repo.comments().is_empty());
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let app = test_app(MockAuthService::new());
    let blog = app
        .repo
        .seed_content(ContentKind::Blogs, "hello", ContentStatus::Published);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/blogs/{}/comments", blog.id),
            json!({ "author_name": "Ama", "content": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Comment is required");
}

#[tokio::test]
async fn open_competition_accepts_applications() {
    let app = test_app(MockAuthService::new());
    let competition = app
        .repo
        .seed_content(ContentKind::Competitions, "essay-prize", ContentStatus::Open);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/competitions/{}/applications", competition.id),
            json!({
                "applicant_name": "Kofi",
                "email": "kofi@example.org",
                "attachment_path": "competition-applications/123-abc.pdf"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["status"], "pending");
    assert_eq!(app.repo.applications().len(), 1);
}

#[tokio::test]
async fn closed_competition_refuses_applications() {
    let app = test_app(MockAuthService::new());
    let competition = app
        .repo
        .seed_content(ContentKind::Competitions, "essay-prize", ContentStatus::Closed);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/competitions/{}/applications", competition.id),
            json!({ "applicant_name": "Kofi", "email": "kofi@example.org" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Competition is not accepting applications"
    );
}

#[tokio::test]
async fn application_with_bad_email_is_rejected() {
    let app = test_app(MockAuthService::new());
    let competition = app
        .repo
        .seed_content(ContentKind::Competitions, "essay-prize", ContentStatus::Open);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/competitions/{}/applications", competition.id),
            json!({ "applicant_name": "Kofi", "email": "not-an-email" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.repo.applications().is_empty());
}
