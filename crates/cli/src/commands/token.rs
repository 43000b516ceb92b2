//! Token commands.
//!
//! # Usage
//!
//! ```bash
//! avara-cli token issue -c cus_123 -e ada@example.com [-i authid_456]
//! avara-cli token verify <token>
//! ```
//!
//! # Environment Variables
//!
//! - `JWT_SECRET` - signing secret (same rules as the server)
//! - `JWT_EXPIRES_IN` - token lifetime, default `7d`

use thiserror::Error;

use avara_core::{AuthIdentityId, CustomerId, Email, EmailError};
use avara_store_api::config::{ConfigError, JwtConfig};
use avara_store_api::services::{TokenError, TokenService};

#[derive(Debug, Error)]
pub enum TokenCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Customer id must not be empty")]
    EmptyCustomerId,

    #[error("Token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("Failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
}

fn token_service() -> Result<TokenService, TokenCommandError> {
    dotenvy::dotenv().ok();
    let jwt = JwtConfig::from_env()?;
    Ok(TokenService::new(&jwt.secret, jwt.expires_in))
}

/// Print a signed token for the given customer.
///
/// # Errors
///
/// Returns an error if the secret is not configured, the input is invalid,
/// or signing fails.
pub fn issue(
    customer_id: &str,
    email: &str,
    identity: Option<&str>,
) -> Result<(), TokenCommandError> {
    let customer_id = CustomerId::new(customer_id.trim());
    if customer_id.is_empty() {
        return Err(TokenCommandError::EmptyCustomerId);
    }
    let email = Email::parse(email)?;
    let tokens = token_service()?;

    let token = match identity {
        Some(identity) => tokens.issue_for_identity(
            &AuthIdentityId::new(identity.trim()),
            &customer_id,
            &email,
        )?,
        None => tokens.issue(&customer_id, &email)?,
    };

    tracing::info!(%customer_id, ttl = ?tokens.ttl(), "Token issued");

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}

/// Print the decoded claims of a token.
///
/// # Errors
///
/// Returns `TokenCommandError::Token` with the typed reason when the token
/// does not verify.
pub fn verify(token: &str) -> Result<(), TokenCommandError> {
    let claims = token_service()?.verify(token.trim())?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&claims)?);
    }
    Ok(())
}
