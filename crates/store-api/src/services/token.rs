//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying a single, versioned claim set. A token
//! must name a customer, an auth identity, or both; which of the two is
//! present decides where customer resolution starts.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use avara_core::{AuthIdentityId, CustomerId, Email};

/// Claim set version written by [`TokenService`].
pub const TOKEN_VERSION: u8 = 1;

/// Lifetime of password reset tokens.
pub const PASSWORD_RESET_TTL: Duration = Duration::from_secs(15 * 60);

const PASSWORD_RESET_PURPOSE: &str = "password_reset";

/// Appended to the secret for reset tokens, so they never verify as bearer
/// tokens and the other way round.
const RESET_KEY_CONTEXT: &[u8] = b"/password-reset";

/// Reasons a token is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a JWT, bad encoding, or claims of the wrong shape.
    #[error("malformed token")]
    Malformed,
    /// Signature does not match the configured secret.
    #[error("invalid token signature")]
    InvalidSignature,
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,
    /// Neither `customer_id` nor `auth_identity_id` is set.
    #[error("token names no customer or identity")]
    MissingSubject,
    /// `ver` is absent or not [`TOKEN_VERSION`].
    #[error("unsupported token version {0}")]
    UnsupportedVersion(u8),
    /// Signing failed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Version 1 claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Claim set version; missing decodes as 0 and is rejected.
    #[serde(default)]
    pub ver: u8,
    /// Direct customer reference, or empty.
    #[serde(default)]
    pub customer_id: String,
    /// Auth identity reference, or empty.
    #[serde(default)]
    pub auth_identity_id: String,
    /// Customer email at issuance.
    #[serde(default)]
    pub email: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

impl TokenClaims {
    /// Direct customer reference, if non-empty.
    #[must_use]
    pub fn customer_id(&self) -> Option<CustomerId> {
        non_empty(&self.customer_id).map(CustomerId::from)
    }

    /// Auth identity reference, if non-empty.
    #[must_use]
    pub fn auth_identity_id(&self) -> Option<AuthIdentityId> {
        non_empty(&self.auth_identity_id).map(AuthIdentityId::from)
    }
}

/// Claims of a password reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub ver: u8,
    pub purpose: String,
    pub auth_identity_id: String,
    pub email: String,
    /// Fingerprint of the password hash the token was issued against.
    /// Changing the password invalidates every outstanding token.
    pub fpr: String,
    pub iat: i64,
    pub exp: i64,
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Signs and verifies bearer tokens with a shared secret.
///
/// Cheap to clone; keys are derived once at construction.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    reset_encoding_key: EncodingKey,
    reset_decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a service signing with `secret`; issued tokens live for `ttl`.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let reset_secret = [secret, RESET_KEY_CONTEXT].concat();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            reset_encoding_key: EncodingKey::from_secret(&reset_secret),
            reset_decoding_key: DecodingKey::from_secret(&reset_secret),
            validation,
            ttl,
        }
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a customer.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the token cannot be encoded.
    pub fn issue(&self, customer_id: &CustomerId, email: &Email) -> Result<String, TokenError> {
        self.sign(customer_id.as_str(), "", email)
    }

    /// Issue a token that also carries the auth identity reference.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the token cannot be encoded.
    pub fn issue_for_identity(
        &self,
        auth_identity_id: &AuthIdentityId,
        customer_id: &CustomerId,
        email: &Email,
    ) -> Result<String, TokenError> {
        self.sign(customer_id.as_str(), auth_identity_id.as_str(), email)
    }

    /// Verify signature, expiry, version and subject.
    ///
    /// A token is expired once `exp < now`, with no leeway.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`TokenError`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| map_decode_error(&e))?
            .claims;

        if claims.ver != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(claims.ver));
        }
        if claims.customer_id().is_none() && claims.auth_identity_id().is_none() {
            return Err(TokenError::MissingSubject);
        }

        Ok(claims)
    }

    /// Issue a password reset token for an identity.
    ///
    /// `fingerprint` identifies the current password hash; see
    /// [`ResetClaims::fpr`].
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the token cannot be encoded.
    pub fn issue_password_reset(
        &self,
        auth_identity_id: &AuthIdentityId,
        email: &Email,
        fingerprint: &str,
    ) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(PASSWORD_RESET_TTL.as_secs()).unwrap_or(i64::MAX);
        let claims = ResetClaims {
            ver: TOKEN_VERSION,
            purpose: PASSWORD_RESET_PURPOSE.to_owned(),
            auth_identity_id: auth_identity_id.as_str().to_owned(),
            email: email.as_str().to_owned(),
            fpr: fingerprint.to_owned(),
            iat,
            exp: iat.saturating_add(ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.reset_encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a password reset token.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`TokenError`]. Bearer tokens
    /// fail with `TokenError::InvalidSignature`.
    pub fn verify_password_reset(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let claims = decode::<ResetClaims>(token, &self.reset_decoding_key, &self.validation)
            .map_err(|e| map_decode_error(&e))?
            .claims;

        if claims.ver != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(claims.ver));
        }
        if claims.purpose != PASSWORD_RESET_PURPOSE {
            return Err(TokenError::Malformed);
        }
        if non_empty(&claims.auth_identity_id).is_none() {
            return Err(TokenError::MissingSubject);
        }

        Ok(claims)
    }

    fn sign(
        &self,
        customer_id: &str,
        auth_identity_id: &str,
        email: &Email,
    ) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            ver: TOKEN_VERSION,
            customer_id: customer_id.to_owned(),
            auth_identity_id: auth_identity_id.to_owned(),
            email: email.as_str().to_owned(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn map_decode_error(error: &jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}
