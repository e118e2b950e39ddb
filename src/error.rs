//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::{AuthError, AuthErrorCode};
use crate::chart::ChartError;

// ---

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let (status, code, message) = match &self {
            AppError::Auth(err) => {
                let status = match err {
                    AuthError::Rejected(
                        AuthErrorCode::EmailNotFound
                        | AuthErrorCode::InvalidPassword
                        | AuthErrorCode::InvalidLoginCredentials
                        | AuthErrorCode::UserDisabled,
                    ) => StatusCode::UNAUTHORIZED,
                    AuthError::Rejected(AuthErrorCode::EmailExists) => StatusCode::CONFLICT,
                    AuthError::Rejected(AuthErrorCode::TooManyAttempts) => {
                        StatusCode::TOO_MANY_REQUESTS
                    }
                    AuthError::Rejected(_) => StatusCode::BAD_REQUEST,
                    AuthError::Transport(e) => {
                        tracing::error!(error = %e, "Identity service request failed");
                        StatusCode::BAD_GATEWAY
                    }
                };
                let code = match err {
                    AuthError::Rejected(code) => code.as_str().to_string(),
                    AuthError::Transport(_) => "AUTH_UNAVAILABLE".to_string(),
                };
                (status, code, err.user_message().to_string())
            }
            AppError::Chart(err) => {
                tracing::error!(error = %err, "Chart rendering failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR".to_string(),
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED".to_string(),
                "Please sign in to view the dashboard.".to_string(),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST".to_string(),
                msg.clone(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
