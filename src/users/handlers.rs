use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use super::{
    dto::{AddDetailsRequest, EduDetailsRequest, RegDetailsRequest, RegisterUserRequest},
    repo_types::{ProfileUpdate, RegisteredUser, UnregisteredUser},
    services,
};
use crate::{
    auth::{
        cookies,
        extractors::{Identity, MaybeIdentity, RequireRegistered, RequireUnregistered},
        jwt::JwtKeys,
    },
    error::{ApiError, ApiResponse},
    state::AppState,
};

pub fn unregistered_routes() -> Router<AppState> {
    Router::new()
        .route("/user/unregistered/getDetails", get(unregistered_details))
        .route("/user/unregistered/saveRegDetails", post(save_unregistered_reg))
        .route("/user/unregistered/saveEduDetail", post(save_unregistered_edu))
        .route("/user/unregistered/saveAddDetail", post(save_unregistered_add))
        .route("/user/registerUser", post(register_user))
}

pub fn registered_routes() -> Router<AppState> {
    Router::new()
        .route("/user/registered/getDetails", get(registered_details))
        .route("/user/registered/getDetails/:username", get(user_details))
        .route("/user/registered/saveRegDetails", post(save_registered_reg))
        .route("/user/registered/saveEduDetail", post(save_registered_edu))
        .route("/user/registered/saveAddDetail", post(save_registered_add))
        .route("/user/discover", get(discover))
}

type Envelope<T> = (StatusCode, Json<ApiResponse<T>>);

// --- onboarding wizard ---

#[instrument(skip(state, identity))]
pub async fn unregistered_details(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Result<Envelope<Value>, ApiError> {
    if let Identity::Unregistered(caller) = identity {
        let user = state.users.find_unregistered_by_email(&caller.email).await?;
        return Ok(ApiResponse::ok(
            StatusCode::OK,
            serde_json::to_value(user).map_err(anyhow::Error::from)?,
            "Fetched unregistered user details",
        ));
    }
    Ok(ApiResponse::ok(
        StatusCode::OK,
        json!({}),
        "No user token, new registration flow",
    ))
}

async fn save_step(
    state: &AppState,
    email: &str,
    update: ProfileUpdate,
) -> Result<UnregisteredUser, ApiError> {
    Ok(state.users.upsert_unregistered(email, &update).await?)
}

#[instrument(skip(state, caller, payload))]
pub async fn save_unregistered_reg(
    State(state): State<AppState>,
    RequireUnregistered(caller): RequireUnregistered,
    Json(payload): Json<RegDetailsRequest>,
) -> Result<Envelope<UnregisteredUser>, ApiError> {
    let update = services::reg_details_update(payload)?;
    if update.name.is_none() || update.username.is_none() {
        return Err(ApiError::Validation("Please provide name, email, and username".into()));
    }
    if let Some(username) = update.username.as_deref() {
        if state.users.find_registered_by_username(username).await?.is_some() {
            warn!(%username, "onboarding picked a taken username");
            return Err(ApiError::Conflict("Username already exists".into()));
        }
    }
    let user = save_step(&state, &caller.email, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "User details saved successfully"))
}

#[instrument(skip(state, caller, payload))]
pub async fn save_unregistered_edu(
    State(state): State<AppState>,
    RequireUnregistered(caller): RequireUnregistered,
    Json(payload): Json<EduDetailsRequest>,
) -> Result<Envelope<UnregisteredUser>, ApiError> {
    let update = services::edu_details_update(payload, true)?;
    let user = save_step(&state, &caller.email, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "Education saved successfully"))
}

#[instrument(skip(state, caller, payload))]
pub async fn save_unregistered_add(
    State(state): State<AppState>,
    RequireUnregistered(caller): RequireUnregistered,
    Json(payload): Json<AddDetailsRequest>,
) -> Result<Envelope<UnregisteredUser>, ApiError> {
    let update = services::add_details_update(payload)?;
    let user = save_step(&state, &caller.email, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "Additional details saved successfully"))
}

/// Finalization: swaps the registration cookie for an access cookie.
#[instrument(skip(state, caller, jar, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    RequireUnregistered(caller): RequireUnregistered,
    jar: CookieJar,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = services::finalize_registration(state.users.as_ref(), &caller, payload).await?;
    let token = JwtKeys::from_ref(&state).issue_registered_token(&user)?;
    let jar = cookies::clear_registration(jar).add(cookies::access_cookie(token, state.config.environment));
    Ok((
        jar,
        ApiResponse::ok(StatusCode::CREATED, user, "User registered successfully"),
    ))
}

// --- registered users ---

async fn load_registered(state: &AppState, username: &str) -> Result<RegisteredUser, ApiError> {
    state
        .users
        .find_registered_by_username(username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

#[instrument(skip(state, caller))]
pub async fn registered_details(
    State(state): State<AppState>,
    RequireRegistered(caller): RequireRegistered,
) -> Result<Envelope<RegisteredUser>, ApiError> {
    let user = load_registered(&state, &caller.username).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "User details fetched successfully"))
}

/// Public profile page; open to anonymous, provisional and registered callers.
#[instrument(skip(state, viewer))]
pub async fn user_details(
    State(state): State<AppState>,
    MaybeIdentity(viewer): MaybeIdentity,
    Path(username): Path<String>,
) -> Result<Envelope<RegisteredUser>, ApiError> {
    let user = load_registered(&state, &username).await?;
    if let Identity::Registered(v) = &viewer {
        tracing::debug!(viewer = %v.username, profile = %user.username, "profile viewed");
    }
    Ok(ApiResponse::ok(StatusCode::OK, user, "User details fetched successfully"))
}

async fn update_own(
    state: &AppState,
    username: &str,
    update: ProfileUpdate,
) -> Result<RegisteredUser, ApiError> {
    state
        .users
        .update_registered(username, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

#[instrument(skip(state, caller, payload))]
pub async fn save_registered_reg(
    State(state): State<AppState>,
    RequireRegistered(caller): RequireRegistered,
    Json(payload): Json<RegDetailsRequest>,
) -> Result<Envelope<RegisteredUser>, ApiError> {
    let mut update = services::reg_details_update(payload)?;
    // Usernames are the registered token's subject and stay fixed.
    update.username = None;
    let user = update_own(&state, &caller.username, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "Registered user details updated"))
}

#[instrument(skip(state, caller, payload))]
pub async fn save_registered_edu(
    State(state): State<AppState>,
    RequireRegistered(caller): RequireRegistered,
    Json(payload): Json<EduDetailsRequest>,
) -> Result<Envelope<RegisteredUser>, ApiError> {
    let update = services::edu_details_update(payload, false)?;
    let user = update_own(&state, &caller.username, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "Education updated"))
}

#[instrument(skip(state, caller, payload))]
pub async fn save_registered_add(
    State(state): State<AppState>,
    RequireRegistered(caller): RequireRegistered,
    Json(payload): Json<AddDetailsRequest>,
) -> Result<Envelope<RegisteredUser>, ApiError> {
    let update = services::add_details_update(payload)?;
    let user = update_own(&state, &caller.username, update).await?;
    Ok(ApiResponse::ok(StatusCode::OK, user, "Additional details updated"))
}

#[instrument(skip(state, caller))]
pub async fn discover(
    State(state): State<AppState>,
    RequireRegistered(caller): RequireRegistered,
) -> Result<Envelope<Vec<RegisteredUser>>, ApiError> {
    let mut users = state.users.list_registered_except(&caller.username).await?;
    users.shuffle(&mut rand::thread_rng());
    Ok(ApiResponse::ok(StatusCode::OK, users, "Users fetched successfully"))
}
