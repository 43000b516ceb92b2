//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients only ever see the generic
//! `{success: false, message, errors?}` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Body used for every 401 response.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// A single validation failure, addressed by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error envelope sent to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Application-level error type for the store API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request body failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation failure with per-field details.
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(RepositoryError::NotFound | RepositoryError::Conflict(_)) => false,
            Self::Database(_) | Self::Internal(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Token(_)
            ),
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Validation(_) | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let (message, errors) = match self {
            Self::Database(RepositoryError::NotFound) => ("Not found".to_string(), None),
            Self::Database(RepositoryError::Conflict(what)) => (what, None),
            Self::Database(_) | Self::Internal(_) => ("Internal server error".to_string(), None),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => ("Invalid email or password".to_string(), None),
                AuthError::UserAlreadyExists => {
                    ("An account with this email already exists".to_string(), None)
                }
                AuthError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
                AuthError::InvalidResetToken => (
                    "Invalid or expired reset token. Please request a new password reset."
                        .to_string(),
                    None,
                ),
                _ => ("Internal server error".to_string(), None),
            },
            Self::Validation { message, errors } => (message, Some(errors)),
            Self::NotFound(what) => (format!("{what} not found"), None),
            Self::Unauthorized => (UNAUTHORIZED_MESSAGE.to_string(), None),
            Self::BadRequest(message) => (message, None),
            Self::RateLimited => ("Too many requests".to_string(), None),
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
///
/// Call this after successful authentication to associate errors with customers.
pub fn set_sentry_user(customer_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
