use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{SigninRequest, SignupRequest},
    jwt::JwtKeys,
    oauth::OAuthProfile,
    password::{check_password, hash_password, PasswordCheck},
};
use crate::{
    error::ApiError,
    users::{
        repo::UserStore,
        repo_types::{NewRegisteredUser, RegisteredUser, UnregisteredUser},
    },
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,30}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Outcome of an OAuth login: which kind of session to open.
#[derive(Debug)]
pub enum OAuthSession {
    Registered { user: RegisteredUser, token: String },
    Unregistered { user: UnregisteredUser, token: String },
}

/// An email already owned by a registered user gets a registered session;
/// any other email gets (or reuses) a provisional record.
pub async fn sign_in_with_profile(
    keys: &JwtKeys,
    users: &dyn UserStore,
    profile: &OAuthProfile,
) -> Result<OAuthSession, ApiError> {
    let email = profile.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Provider returned an invalid email".into()));
    }
    // Matching on email hands over existing accounts, so the provider must vouch for it.
    if !profile.email_verified {
        warn!(%email, "oauth profile with unverified email");
        return Err(ApiError::Validation("Provider email is not verified".into()));
    }

    if let Some(user) = users.find_registered_by_email(&email).await? {
        let token = keys.issue_registered_token(&user)?;
        info!(user_id = %user.id, "oauth login for registered user");
        return Ok(OAuthSession::Registered { user, token });
    }

    let user = users
        .ensure_unregistered(&email, Some(profile.name.as_str()), profile.picture.as_deref())
        .await?;
    let token = keys.issue_unregistered_token(&user)?;
    info!(user_id = %user.id, "oauth login for unregistered user");
    Ok(OAuthSession::Unregistered { user, token })
}

pub async fn signup(
    keys: &JwtKeys,
    users: &dyn UserStore,
    mut req: SignupRequest,
) -> Result<(RegisteredUser, String), ApiError> {
    req.email = req.email.trim().to_lowercase();
    req.username = req.username.trim().to_string();
    req.name = req.name.trim().to_string();

    if req.username.is_empty() || req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username, name, email and password are required".into(),
        ));
    }
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if !is_valid_username(&req.username) {
        return Err(ApiError::Validation(
            "Username must be 3-30 letters, digits, '.', '_' or '-'".into(),
        ));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if users.find_registered_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    if users.find_registered_by_username(&req.username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let mut new_user = NewRegisteredUser::basic(&req.username, &req.email, &req.name);
    new_user.password_hash = Some(hash_password(&req.password)?);
    new_user.picture = req.picture.filter(|p| !p.trim().is_empty());

    // Stale provisional records for this email are dropped in the same step.
    let user = users.finalize_registration(new_user).await?;
    let token = keys.issue_registered_token(&user)?;
    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok((user, token))
}

pub async fn signin(
    keys: &JwtKeys,
    users: &dyn UserStore,
    req: SigninRequest,
) -> Result<(RegisteredUser, String), ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }

    let Some(user) = users.find_registered_by_email(&email).await? else {
        warn!(%email, "signin unknown email");
        return Err(ApiError::BadCredentials);
    };

    match check_password(&req.password, user.password_hash.as_deref())? {
        PasswordCheck::Match => {}
        PasswordCheck::Mismatch => {
            warn!(user_id = %user.id, "signin invalid password");
            return Err(ApiError::BadCredentials);
        }
        PasswordCheck::NoLocalPassword => {
            return Err(ApiError::Validation(
                "No local password found for this account. Please login via Google.".into(),
            ));
        }
    }

    let token = keys.issue_registered_token(&user)?;
    info!(user_id = %user.id, "user signed in");
    Ok((user, token))
}
