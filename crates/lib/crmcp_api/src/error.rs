//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crmcp_core::auth::AuthError;
use crmcp_core::crm::{CrmError, ErrorCode};
use crmcp_core::ephemeral::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Domain error from a tool call; rendered as `{code, message, details}`.
    #[error(transparent)]
    Crm(#[from] CrmError),

    #[error("Internal server error")]
    Internal(String),
}

/// HTTP status for a domain error code.
pub fn crm_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::ValidationError | ErrorCode::InvalidStage => StatusCode::BAD_REQUEST,
        ErrorCode::DeletionHasDependencies | ErrorCode::DuplicateInvite => StatusCode::CONFLICT,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Crm(e) => return (crm_status(e.code), Json(e.to_value())).into_response(),
            AppError::Internal(m) => {
                error!("internal error: {m}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(json!({ "error": error, "message": message }));
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        if e.is_forbidden() {
            AppError::Forbidden(e.to_string())
        } else if e.is_internal() {
            AppError::Internal(e.to_string())
        } else {
            AppError::Unauthorized(e.to_string())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// OAuth endpoint errors, rendered as `{error, error_description}`.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::ServerError(_) => "server_error",
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, description) = match &self {
            OAuthError::ServerError(m) => {
                error!("oauth server error: {m}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            OAuthError::InvalidRequest(m)
            | OAuthError::InvalidGrant(m)
            | OAuthError::UnsupportedGrantType(m) => (StatusCode::BAD_REQUEST, m.as_str()),
        };
        let body = Json(json!({
            "error": self.error_code(),
            "error_description": description,
        }));
        (status, body).into_response()
    }
}

impl From<StoreError> for OAuthError {
    fn from(e: StoreError) -> Self {
        OAuthError::ServerError(e.to_string())
    }
}
