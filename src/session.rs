use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
    response::Response,
};
use cookie::{Cookie, CookieJar, SameSite, time::Duration};
use std::{
    convert::Infallible,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    auth::{AuthIdentity, AuthService, SessionTokens},
    error::AuthError,
};

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

// Refresh tokens outlive access tokens; the browser keeps both for a week.
const COOKIE_MAX_AGE: Duration = Duration::days(7);

/// Tokens rotated by the edge gate earlier in the same request. Downstream
/// extractors prefer these over the (now stale) request cookies.
#[derive(Debug, Clone)]
pub struct RefreshedSession(pub SessionTokens);

/// A session cookie with the attributes every write shares. `Secure` is decided
/// when the jar is flushed onto the response.
pub fn session_cookie(name: &'static str, value: impl Into<String>) -> Cookie<'static> {
    Cookie::build((name, value.into()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(COOKIE_MAX_AGE)
        .build()
}

/// PendingCookies
///
/// Cookie changes queued while handling one request. The edge gate installs one
/// per request as an extension, every [`SessionAccessor`] extracted for that
/// request writes into it, and the gate flushes its delta onto the response.
#[derive(Debug, Clone, Default)]
pub struct PendingCookies(Arc<Mutex<CookieJar>>);

impl PendingCookies {
    fn with_jar<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        let mut jar = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut jar)
    }

    /// Queues both cookies of a fresh token pair.
    pub fn store(&self, tokens: &SessionTokens) {
        self.with_jar(|jar| {
            jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()));
            jar.add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()));
        });
    }

    /// Queues removal of both session cookies.
    pub fn clear(&self) {
        self.with_jar(|jar| {
            for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
                let mut removal = session_cookie(name, "");
                removal.make_removal();
                jar.add(removal);
            }
        });
    }

    pub fn is_empty(&self) -> bool {
        self.with_jar(|jar| jar.delta().next().is_none())
    }

    /// Appends every queued change to the response as its own `Set-Cookie` header.
    pub fn apply(&self, mut response: Response, secure: bool) -> Response {
        let rendered: Vec<String> = self.with_jar(|jar| {
            jar.delta()
                .map(|cookie| {
                    let mut cookie = cookie.clone();
                    cookie.set_secure(secure);
                    cookie.encoded().to_string()
                })
                .collect()
        });
        for value in rendered {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(err) => tracing::error!(error = %err, "dropping unrepresentable cookie"),
            }
        }
        response
    }
}

/// Finds a cookie value in the request's `Cookie` header(s). Values are
/// percent-decoded and stripped of RFC 6265 quotes; empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse_encoded(raw))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name && !cookie.value_trimmed().is_empty())
        .map(|cookie| cookie.value_trimmed().to_string())
}

/// SessionAccessor
///
/// The caller's session for one request, bound to its cookies. It is passed
/// explicitly into the edge gate and the route guard; nothing reads session
/// state from ambient storage.
///
/// Token rotation and sign-in/out go through the accessor, which queues the
/// matching cookie writes in the request's [`PendingCookies`].
#[derive(Debug, Clone, Default)]
pub struct SessionAccessor {
    tokens: Option<SessionTokens>,
    cookies: PendingCookies,
    refreshed: bool,
}

impl SessionAccessor {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let access = read_cookie(headers, ACCESS_COOKIE);
        let refresh = read_cookie(headers, REFRESH_COOKIE);
        let tokens = match (access, refresh) {
            (None, None) => None,
            (access, refresh) => Some(SessionTokens {
                access_token: access.unwrap_or_default(),
                refresh_token: refresh.unwrap_or_default(),
            }),
        };
        Self {
            tokens,
            ..Self::default()
        }
    }

    /// Writes go to `cookies` instead of a private jar.
    pub fn with_cookies(mut self, cookies: PendingCookies) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    fn access_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|tokens| tokens.access_token.as_str())
            .filter(|token| !token.is_empty())
    }

    fn refresh_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|tokens| tokens.refresh_token.as_str())
            .filter(|token| !token.is_empty())
    }

    /// True once a refresh has rotated the tokens during this request.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn cookies(&self) -> &PendingCookies {
        &self.cookies
    }

    /// Adopts a freshly issued pair and queues its cookies.
    pub fn store(&mut self, tokens: SessionTokens) {
        self.cookies.store(&tokens);
        self.tokens = Some(tokens);
    }

    /// Forgets the session and queues cookie removal.
    pub fn clear(&mut self) {
        self.cookies.clear();
        self.tokens = None;
    }

    /// Cached variant: local decode of the access token, no round trip.
    pub fn session(&self, auth: &dyn AuthService) -> Option<AuthIdentity> {
        auth.decode_session(self.access_token()?)
    }

    async fn check_access_token(
        &self,
        auth: &dyn AuthService,
    ) -> Result<Option<AuthIdentity>, AuthError> {
        match self.access_token() {
            Some(token) => auth.get_user(token).await,
            None => Ok(None),
        }
    }

    /// Verified variant: asks the auth service. When the access token is missing
    /// or rejected and a refresh token is present, rotates the pair once per
    /// request, queues the cookie writes and verifies again.
    pub async fn verified_user(
        &mut self,
        auth: &dyn AuthService,
    ) -> Result<Option<AuthIdentity>, AuthError> {
        if let Some(user) = self.check_access_token(auth).await? {
            return Ok(Some(user));
        }
        if self.refreshed {
            return Ok(None);
        }

        let Some(refresh_token) = self.refresh_token().map(str::to_owned) else {
            return Ok(None);
        };

        match auth.refresh_session(&refresh_token).await? {
            Some((tokens, _)) => {
                tracing::debug!("session refreshed");
                self.store(tokens);
                self.refreshed = true;
                self.check_access_token(auth).await
            }
            None => Ok(None),
        }
    }
}

impl<S> FromRequestParts<S> for SessionAccessor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cookies = parts
            .extensions
            .get::<PendingCookies>()
            .cloned()
            .unwrap_or_default();
        let accessor = match parts.extensions.get::<RefreshedSession>() {
            // Already rotated once in this request.
            Some(RefreshedSession(tokens)) => SessionAccessor {
                tokens: Some(tokens.clone()),
                refreshed: true,
                ..SessionAccessor::default()
            },
            None => SessionAccessor::from_headers(&parts.headers),
        };
        Ok(accessor.with_cookies(cookies))
    }
}
