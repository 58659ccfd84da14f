//! Edge access gate.
//!
//! Runs before routing on every request under the admin prefix. It refreshes the
//! caller's session and redirects page requests based on authentication state.
//! The gate fails open (unconfigured platform, verification errors), so it is a
//! convenience layer: every admin handler re-checks through [`crate::guard`].
//!
//! The same middleware owns the request's [`PendingCookies`] on every path and
//! writes whatever was queued (refresh, login, logout) onto the final response.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    session::{PendingCookies, RefreshedSession, SessionAccessor},
};

pub const ADMIN_PREFIX: &str = "/admin";
pub const ADMIN_API_PREFIX: &str = "/admin/api";
pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    RedirectToLogin,
    RedirectToDashboard,
    PassThrough,
}

/// True for `/admin` and anything below it, but not `/administrator`.
pub fn is_admin_path(path: &str) -> bool {
    under(path, ADMIN_PREFIX)
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// The redirect table. API paths are never redirected: they answer 401 JSON from
/// the route guard instead.
pub fn decide(path: &str, authenticated: bool) -> GateDecision {
    let is_login = path == LOGIN_PATH;
    if is_login {
        return if authenticated {
            GateDecision::RedirectToDashboard
        } else {
            GateDecision::PassThrough
        };
    }
    if is_admin_path(path) && !under(path, ADMIN_API_PREFIX) && !authenticated {
        return GateDecision::RedirectToLogin;
    }
    GateDecision::PassThrough
}

/// edge_gate
///
/// Axum middleware wrapping the whole router.
pub async fn edge_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let cookies = PendingCookies::default();
    request.extensions_mut().insert(cookies.clone());

    let path = request.uri().path().to_owned();
    let response = if is_admin_path(&path) {
        gate_admin(&state, &path, &cookies, request, next).await
    } else {
        next.run(request).await
    };

    cookies.apply(response, state.config.cookie_secure)
}

async fn gate_admin(
    state: &AppState,
    path: &str,
    cookies: &PendingCookies,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(backend) = state.backend.as_ref() else {
        tracing::debug!(%path, "platform not configured, edge gate passing through");
        return next.run(request).await;
    };

    let mut session = SessionAccessor::from_headers(request.headers()).with_cookies(cookies.clone());
    let verified = session.verified_user(backend.auth.as_ref()).await;

    // Handlers further down must see the rotated pair, not the stale cookies.
    if session.was_refreshed() {
        if let Some(tokens) = session.tokens() {
            request
                .extensions_mut()
                .insert(RefreshedSession(tokens.clone()));
        }
    }

    match verified {
        Ok(user) => match decide(path, user.is_some()) {
            GateDecision::RedirectToLogin => Redirect::temporary(LOGIN_PATH).into_response(),
            GateDecision::RedirectToDashboard => {
                Redirect::temporary(DASHBOARD_PATH).into_response()
            }
            GateDecision::PassThrough => next.run(request).await,
        },
        Err(err) => {
            tracing::warn!(%path, error = %err, "session verification failed, passing through");
            next.run(request).await
        }
    }
}
