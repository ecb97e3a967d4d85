use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Failures surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential was presented where one is required.
    #[error("Please Login")]
    Unauthenticated,

    #[error("Login Again, Session Expired")]
    SessionExpired,

    /// Bad signature, malformed token, wrong token kind or unknown subject.
    #[error("Invalid Access Token")]
    InvalidCredential,

    /// Local signin with an unknown email or a wrong password.
    #[error("Invalid credentials")]
    BadCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated
            | ApiError::SessionExpired
            | ApiError::InvalidCredential
            | ApiError::BadCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(field) => ApiError::Conflict(match field {
                "email" => "Email already registered".into(),
                "username" => "Username already taken".into(),
                other => format!("{other} already taken"),
            }),
            StoreError::Backend(e) => ApiError::Internal(e),
        }
    }
}

/// Envelope shared by every JSON response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: Option<T>,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(status: StatusCode, data: T, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status_code: status.as_u16(),
                data: Some(data),
                message: message.into(),
                success: status.is_success(),
            }),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(e) = &self {
            error!(error = %e, "request failed");
        }
        let body = Json(ApiResponse::<()> {
            status_code: status.as_u16(),
            data: None,
            message: self.to_string(),
            success: false,
        });
        (status, body).into_response()
    }
}
