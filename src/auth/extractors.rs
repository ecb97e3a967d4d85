//! Request gates.
//!
//! Each gate locates a raw token, verifies it, resolves the subject against
//! the store matching the token's shape and yields a normalized identity. A
//! token of the wrong kind is rejected as invalid, not as missing.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    claims::Subject,
    cookies::{ACCESS_COOKIE, REGISTRATION_COOKIE},
    jwt::JwtKeys,
};
use crate::{error::ApiError, state::AppState, users::repo::UserStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredIdentity {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnregisteredIdentity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// Caller identity as seen by handlers behind the optional gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Identity {
    Registered(RegisteredIdentity),
    Unregistered(UnregisteredIdentity),
    Anonymous,
}

/// Raw tokens found on a request.
#[derive(Debug, Clone, Default)]
pub struct PresentedCredentials {
    pub registration_cookie: Option<String>,
    pub access_cookie: Option<String>,
    pub bearer: Option<String>,
}

fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim())
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl PresentedCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        let cookie = |name: &str| non_empty(jar.get(name).map(|c| c.value().to_string()));
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);
        Self {
            registration_cookie: cookie(REGISTRATION_COOKIE),
            access_cookie: cookie(ACCESS_COOKIE),
            bearer: non_empty(bearer),
        }
    }

    /// Registration cookie, access cookie, bearer header.
    pub fn for_registered(&self) -> Option<&str> {
        self.registration_cookie
            .as_deref()
            .or(self.access_cookie.as_deref())
            .or(self.bearer.as_deref())
    }

    /// Registration cookie, bearer header. The access cookie is never consulted.
    pub fn for_unregistered(&self) -> Option<&str> {
        self.registration_cookie
            .as_deref()
            .or(self.bearer.as_deref())
    }

    pub fn for_either(&self) -> Option<&str> {
        self.for_registered()
    }
}

async fn resolve_registered(
    users: &dyn UserStore,
    username: &str,
) -> Result<RegisteredIdentity, ApiError> {
    match users.find_registered_by_username(username).await {
        Ok(Some(u)) => Ok(RegisteredIdentity {
            id: u.id,
            username: u.username,
            name: u.name,
            email: u.email,
        }),
        Ok(None) => {
            warn!(%username, "token subject not found");
            Err(ApiError::InvalidCredential)
        }
        Err(e) => {
            error!(error = %e, "registered user lookup failed");
            Err(ApiError::InvalidCredential)
        }
    }
}

async fn resolve_unregistered(
    users: &dyn UserStore,
    email: &str,
) -> Result<UnregisteredIdentity, ApiError> {
    match users.find_unregistered_by_email(email).await {
        Ok(Some(u)) => Ok(UnregisteredIdentity {
            id: u.id,
            email: u.email,
            name: u.name,
        }),
        Ok(None) => {
            warn!(%email, "token subject not found");
            Err(ApiError::InvalidCredential)
        }
        Err(e) => {
            error!(error = %e, "unregistered user lookup failed");
            Err(ApiError::InvalidCredential)
        }
    }
}

fn subject_of(keys: &JwtKeys, token: &str) -> Result<Subject, ApiError> {
    keys.verify(token)?.subject().ok_or_else(|| {
        warn!("token carries an ambiguous subject");
        ApiError::InvalidCredential
    })
}

pub async fn authenticate_registered(
    keys: &JwtKeys,
    users: &dyn UserStore,
    creds: &PresentedCredentials,
) -> Result<RegisteredIdentity, ApiError> {
    let token = creds.for_registered().ok_or(ApiError::Unauthenticated)?;
    match subject_of(keys, token)? {
        Subject::Registered { username, .. } => resolve_registered(users, &username).await,
        Subject::Unregistered { .. } => {
            warn!("unregistered token presented to a registered-only gate");
            Err(ApiError::InvalidCredential)
        }
    }
}

pub async fn authenticate_unregistered(
    keys: &JwtKeys,
    users: &dyn UserStore,
    creds: &PresentedCredentials,
) -> Result<UnregisteredIdentity, ApiError> {
    let token = creds.for_unregistered().ok_or(ApiError::Unauthenticated)?;
    match subject_of(keys, token)? {
        Subject::Unregistered { email, .. } => resolve_unregistered(users, &email).await,
        Subject::Registered { .. } => {
            warn!("registered token presented to an onboarding-only gate");
            Err(ApiError::InvalidCredential)
        }
    }
}

/// Never fails on a missing token; always fails on an expired one.
pub async fn authenticate_optional(
    keys: &JwtKeys,
    users: &dyn UserStore,
    creds: &PresentedCredentials,
) -> Result<Identity, ApiError> {
    let Some(token) = creds.for_either() else {
        return Ok(Identity::Anonymous);
    };
    match subject_of(keys, token)? {
        Subject::Unregistered { email, .. } => resolve_unregistered(users, &email)
            .await
            .map(Identity::Unregistered),
        Subject::Registered { username, .. } => resolve_registered(users, &username)
            .await
            .map(Identity::Registered),
    }
}

/// Gate for post-registration endpoints.
pub struct RequireRegistered(pub RegisteredIdentity);

/// Gate for onboarding-wizard endpoints.
pub struct RequireUnregistered(pub UnregisteredIdentity);

/// Gate for endpoints serving both audiences and anonymous callers.
pub struct MaybeIdentity(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for RequireRegistered {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let creds = PresentedCredentials::from_headers(&parts.headers);
        let keys = JwtKeys::from_ref(state);
        authenticate_registered(&keys, state.users.as_ref(), &creds)
            .await
            .map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequireUnregistered {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let creds = PresentedCredentials::from_headers(&parts.headers);
        let keys = JwtKeys::from_ref(state);
        authenticate_unregistered(&keys, state.users.as_ref(), &creds)
            .await
            .map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let creds = PresentedCredentials::from_headers(&parts.headers);
        let keys = JwtKeys::from_ref(state);
        authenticate_optional(&keys, state.users.as_ref(), &creds)
            .await
            .map(Self)
    }
}
