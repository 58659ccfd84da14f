//! Route authorization guard.
//!
//! Every admin or content-mutating handler calls [`authorize`] with the policy it
//! needs before touching the store. Unlike the edge gate, the guard never fails
//! open.

use uuid::Uuid;

use crate::{
    Backend,
    auth::AuthIdentity,
    config::AppConfig,
    error::{ApiError, StoreError},
    models::{NewProfile, Profile, Role},
    repository::Repository,
    session::SessionAccessor,
};

/// How the caller's identity is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Cached session first (local token decode), verified round trip as fallback.
    Session,
    /// Always round-trip to the auth service. Required where a revoked session
    /// must not slip through, e.g. user management.
    Verified,
}

/// AccessPolicy
///
/// What an endpoint accepts. Declared per endpoint; the guard logic is shared.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub allowed: &'static [Role],
    pub identity: IdentityMode,
    /// Self-heal target. When set (and enabled in config), an under-privileged
    /// profile is promoted to this role instead of being rejected.
    pub self_heal: Option<Role>,
}

impl AccessPolicy {
    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

/// Destructive operations and user management.
pub const ADMIN_ONLY: AccessPolicy = AccessPolicy {
    allowed: &[Role::Admin],
    identity: IdentityMode::Verified,
    self_heal: None,
};

/// Content mutation.
pub const CONTENT_EDITORS: AccessPolicy = AccessPolicy {
    allowed: &[Role::Admin, Role::Editor],
    identity: IdentityMode::Session,
    self_heal: None,
};

/// Admin-side reads of drafts, comments and statistics.
pub const CONTENT_READERS: AccessPolicy = AccessPolicy {
    allowed: &[Role::Admin, Role::Editor, Role::Author],
    identity: IdentityMode::Session,
    self_heal: None,
};

/// The dashboard's first call after login.
///
/// SECURITY: with `role_self_heal` enabled, any authenticated user reaching this
/// endpoint is promoted to editor. Keep the flag off in production and promote
/// users through PATCH /admin/api/users/{id}/role instead.
pub const DASHBOARD_BOOTSTRAP: AccessPolicy = AccessPolicy {
    allowed: &[Role::Admin, Role::Editor],
    identity: IdentityMode::Verified,
    self_heal: Some(Role::Editor),
};

/// Caller
///
/// The resolved identity handed to domain logic (audit fields, self-checks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

/// authorize
///
/// 1. identity (per `policy.identity`), else 401;
/// 2. profile lookup, provisioning a missing one with the configured default role;
/// 3. role check against `policy.allowed`, promoting in place on self-heal
///    endpoints when enabled, else 403.
///
/// The "not configured" check happens before this call, when the handler
/// obtains `backend` from the state.
pub async fn authorize(
    backend: &Backend,
    config: &AppConfig,
    session: &mut SessionAccessor,
    policy: &AccessPolicy,
) -> Result<Caller, ApiError> {
    let auth = backend.auth.as_ref();
    let identity = match policy.identity {
        IdentityMode::Session => match session.session(auth) {
            Some(identity) => Some(identity),
            None => session.verified_user(auth).await?,
        },
        IdentityMode::Verified => session.verified_user(auth).await?,
    };
    let identity = identity.ok_or_else(ApiError::unauthorized)?;

    let profile = ensure_profile(backend.repo.as_ref(), &identity, config.default_profile_role).await?;

    if policy.allows(profile.role) {
        return Ok(Caller {
            user_id: profile.id,
            email: profile.email,
            role: profile.role,
        });
    }

    match policy.self_heal {
        Some(target) if config.role_self_heal => {
            tracing::warn!(
                user_id = %profile.id,
                from = %profile.role,
                to = %target,
                "self-heal promoting under-privileged profile"
            );
            let promoted = backend
                .repo
                .update_profile_role(profile.id, target)
                .await?
                .ok_or_else(|| ApiError::Internal("Profile vanished during promotion".to_string()))?;
            Ok(Caller {
                user_id: promoted.id,
                email: promoted.email,
                role: promoted.role,
            })
        }
        _ => {
            tracing::info!(user_id = %profile.id, role = %profile.role, "insufficient role");
            Err(ApiError::forbidden())
        }
    }
}

/// ensure_profile
///
/// Returns the caller's profile, creating it with `default_role` when absent.
/// Creation is insert-if-absent followed by a re-read, so repeated (or racing)
/// first requests converge on a single row.
pub async fn ensure_profile(
    repo: &dyn Repository,
    identity: &AuthIdentity,
    default_role: Role,
) -> Result<Profile, StoreError> {
    if let Some(profile) = repo.get_profile(identity.id).await? {
        return Ok(profile);
    }

    tracing::info!(user_id = %identity.id, role = %default_role, "provisioning missing profile");
    repo.insert_profile_if_absent(NewProfile {
        id: identity.id,
        email: identity.email.clone(),
        role: default_role,
    })
    .await
}
