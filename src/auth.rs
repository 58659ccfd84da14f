use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

use crate::error::AuthError;

/// AuthIdentity
///
/// The caller as known to the auth service. Carries no role: roles live on the
/// profile and are resolved by the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// SessionTokens
///
/// The opaque access/refresh pair issued at login and rotated on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Claims
///
/// The subset of a Supabase access token read by the cached session variant.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the auth user id, also the profile id.
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// AuthService
///
/// Contract for the external authentication service. `decode_session` is the
/// cached variant (no network, may be stale right after login/logout); `get_user`
/// round-trips and is authoritative.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Decodes the access token locally. `None` when the token is invalid, expired,
    /// or local decoding is not available.
    fn decode_session(&self, access_token: &str) -> Option<AuthIdentity>;

    /// Verifies the access token with the auth service. `Ok(None)` means the
    /// service rejected the token.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthIdentity>, AuthError>;

    /// Exchanges a refresh token for a rotated pair. `Ok(None)` means the refresh
    /// token is no longer valid.
    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError>;

    /// Password grant. `Ok(None)` on bad credentials.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Removes the auth user. Requires the elevated service key.
    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError>;
}

/// AuthState
///
/// The concrete type used to share the auth client across the application state.
pub type AuthState = Arc<dyn AuthService>;

// --- GoTrue client ---

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: String,
    user: GoTrueUser,
}

impl GoTrueSession {
    fn into_parts(self) -> (SessionTokens, AuthIdentity) {
        (
            SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
            },
            AuthIdentity {
                id: self.user.id,
                email: self.user.email,
            },
        )
    }
}

/// SupabaseAuthClient
///
/// Talks to the Supabase GoTrue REST API (`/auth/v1`).
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: Option<String>,
    jwt_secret: Option<String>,
}

impl SupabaseAuthClient {
    pub fn new(
        project_url: &str,
        anon_key: &str,
        service_role_key: Option<String>,
        jwt_secret: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            service_role_key,
            jwt_secret,
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError> {
        let response = self
            .http
            .post(format!("{}/token?grant_type={}", self.base_url, grant_type))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let session = response.json::<GoTrueSession>().await?;
                Ok(Some(session.into_parts()))
            }
            // GoTrue answers 400 for bad credentials and revoked refresh tokens.
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(rejected(status, response).await),
        }
    }
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> AuthError {
    let message = response.text().await.unwrap_or_default();
    AuthError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    fn decode_session(&self, access_token: &str) -> Option<AuthIdentity> {
        let secret = self.jwt_secret.as_ref()?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Supabase sets `aud` to "authenticated"; the signature is what matters here.
        validation.validate_aud = false;

        decode::<Claims>(
            access_token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| AuthIdentity {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthIdentity>, AuthError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user = response.json::<GoTrueUser>().await?;
                Ok(Some(AuthIdentity {
                    id: user.id,
                    email: user.email,
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(rejected(status, response).await),
        }
    }

    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            // An already-expired session is as signed out as it gets.
            status if status.is_success() || status == StatusCode::UNAUTHORIZED => Ok(()),
            status => Err(rejected(status, response).await),
        }
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        let service_key = self
            .service_role_key
            .as_ref()
            .ok_or(AuthError::MissingServiceKey)?;

        let response = self
            .http
            .delete(format!("{}/admin/users/{}", self.base_url, user_id))
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(rejected(status, response).await),
        }
    }
}

// --- Mock implementation (for tests) ---

/// MockAuthService
///
/// In-memory stand-in for the auth service. Access tokens map straight to
/// identities; refresh tokens map to the rotated pair they will be exchanged for.
#[derive(Default)]
pub struct MockAuthService {
    sessions: Mutex<HashMap<String, AuthIdentity>>,
    // Every access token ever issued. Signing out does not unsign a JWT, so the
    // cached variant keeps decoding these.
    issued: Mutex<HashMap<String, AuthIdentity>>,
    refreshable: Mutex<HashMap<String, (SessionTokens, AuthIdentity)>>,
    credentials: Mutex<HashMap<(String, String), (SessionTokens, AuthIdentity)>>,
    deleted: Mutex<Vec<Uuid>>,
    verify_calls: AtomicUsize,
    /// Answer `decode_session` from the issued tokens.
    pub cached_sessions: bool,
    /// When true, `get_user` fails as if the service were unreachable.
    pub fail_verification: bool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            fail_verification: true,
            ..Self::default()
        }
    }

    pub fn with_session(self, access_token: &str, identity: AuthIdentity) -> Self {
        self.issue(access_token, &identity);
        self
    }

    /// Lets `decode_session` answer locally, like a client holding the JWT secret.
    pub fn with_cached_sessions(mut self) -> Self {
        self.cached_sessions = true;
        self
    }

    fn issue(&self, access_token: &str, identity: &AuthIdentity) {
        locked(&self.sessions).insert(access_token.to_string(), identity.clone());
        locked(&self.issued).insert(access_token.to_string(), identity.clone());
    }

    pub fn with_refresh(
        self,
        refresh_token: &str,
        rotated: SessionTokens,
        identity: AuthIdentity,
    ) -> Self {
        locked(&self.refreshable).insert(refresh_token.to_string(), (rotated, identity));
        self
    }

    pub fn with_credentials(
        self,
        email: &str,
        password: &str,
        tokens: SessionTokens,
        identity: AuthIdentity,
    ) -> Self {
        locked(&self.credentials).insert(
            (email.to_string(), password.to_string()),
            (tokens, identity),
        );
        self
    }

    /// Number of round-trip verifications performed so far.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn deleted_users(&self) -> Vec<Uuid> {
        locked(&self.deleted).clone()
    }

    pub fn is_signed_in(&self, access_token: &str) -> bool {
        locked(&self.sessions).contains_key(access_token)
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    fn decode_session(&self, access_token: &str) -> Option<AuthIdentity> {
        if !self.cached_sessions {
            return None;
        }
        locked(&self.issued).get(access_token).cloned()
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthIdentity>, AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_verification {
            return Err(AuthError::Rejected {
                status: 503,
                message: "Mock Auth Error: Simulation requested".to_string(),
            });
        }
        Ok(locked(&self.sessions).get(access_token).cloned())
    }

    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError> {
        let Some((tokens, identity)) = locked(&self.refreshable).remove(refresh_token) else {
            return Ok(None);
        };
        self.issue(&tokens.access_token, &identity);
        Ok(Some((tokens, identity)))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<(SessionTokens, AuthIdentity)>, AuthError> {
        let found = locked(&self.credentials)
            .get(&(email.to_string(), password.to_string()))
            .cloned();
        if let Some((tokens, identity)) = &found {
            self.issue(&tokens.access_token, identity);
        }
        Ok(found)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        locked(&self.sessions).remove(access_token);
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        locked(&self.deleted).push(user_id);
        locked(&self.sessions).retain(|_, identity| identity.id != user_id);
        Ok(())
    }
}
