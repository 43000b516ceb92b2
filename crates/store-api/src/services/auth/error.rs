//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::FieldError;
use crate::services::token::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed validation.
    #[error("validation failed: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Wrong password, unknown email, or no linked customer.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Reset token is bad, expired, already used, or for another account.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// An identity already exists for this email.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}
