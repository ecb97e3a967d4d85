use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use super::{
    cookies,
    dto::{AuthResponse, OAuthCallback, PublicUser, SigninRequest, SignupRequest},
    jwt::JwtKeys,
    oauth,
    services::{self, OAuthSession},
};
use crate::{
    error::{ApiError, ApiResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/logout", get(logout))
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
}

/// Starts the provider login, binding it to this browser with a `state` cookie.
#[instrument(skip(state, jar))]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let nonce = oauth::new_state();
    let url = state.oauth.authorize_url(&nonce)?;
    let jar = jar.add(cookies::oauth_state_cookie(nonce, state.config.environment));
    Ok((jar, Redirect::to(&url)))
}

/// Opens a registered or provisional session from the provider's profile and
/// sends the browser to the matching frontend page.
#[instrument(skip(state, jar, params))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<OAuthCallback>,
) -> Response {
    let frontend = state.config.frontend_url.clone();
    let expected = jar.get(cookies::OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    // The state cookie is single-use whatever the outcome.
    let jar = cookies::clear_oauth_state(jar);
    let failure = |jar: CookieJar| (jar, Redirect::to(&format!("{frontend}/login"))).into_response();

    match (expected.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(got)) if !expected.is_empty() && expected == got => {}
        _ => {
            warn!("oauth callback state missing or mismatched");
            return failure(jar);
        }
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!(error = ?params.error, "oauth callback without code");
        return failure(jar);
    };

    let profile = match state.oauth.exchange_code(&code).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "oauth code exchange failed");
            return failure(jar);
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let env = state.config.environment;
    match services::sign_in_with_profile(&keys, state.users.as_ref(), &profile).await {
        Ok(OAuthSession::Registered { token, .. }) => (
            cookies::clear_registration(jar).add(cookies::access_cookie(token, env)),
            Redirect::to(&format!("{frontend}/discover")),
        )
            .into_response(),
        Ok(OAuthSession::Unregistered { token, .. }) => (
            jar.add(cookies::registration_cookie(token, env)),
            Redirect::to(&format!("{frontend}/register")),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "oauth sign-in failed");
            failure(jar)
        }
    }
}

#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    info!("user logged out");
    (
        cookies::clear_all(jar),
        ApiResponse::ok(StatusCode::OK, (), "User logged out successfully"),
    )
}

#[instrument(skip(state, jar, payload))]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::signup(&keys, state.users.as_ref(), payload).await?;
    // A leftover onboarding token would shadow the new session at the registered gate.
    let jar = cookies::clear_registration(jar)
        .add(cookies::access_cookie(token.clone(), state.config.environment));
    Ok((
        jar,
        ApiResponse::ok(
            StatusCode::CREATED,
            AuthResponse {
                user: PublicUser::from(&user),
                token,
            },
            "User created successfully",
        ),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::signin(&keys, state.users.as_ref(), payload).await?;
    // A leftover onboarding token would shadow the new session at the registered gate.
    let jar = cookies::clear_registration(jar)
        .add(cookies::access_cookie(token.clone(), state.config.environment));
    Ok((
        jar,
        ApiResponse::ok(
            StatusCode::OK,
            AuthResponse {
                user: PublicUser::from(&user),
                token,
            },
            "Login successful",
        ),
    ))
}
