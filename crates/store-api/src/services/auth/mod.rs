//! Authentication service.
//!
//! Email + password credentials live on an auth identity (Argon2id hash);
//! the customer record is created alongside it and linked both ways.
//! Tokens are issued by [`TokenService`]. Password reset tokens are
//! delivered through a [`PasswordResetNotifier`].

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Deserialize;

use avara_core::{AuthIdentityId, CustomerId, Email, Metadata, metadata_keys};

use crate::db::{AuthIdentityRepository, CustomerRepository, RepositoryError};
use crate::error::FieldError;
use crate::models::{
    AuthIdentity, Customer, CustomerFilter, CustomerPatch, EMAILPASS_PROVIDER, NewAuthIdentity,
    NewCustomer,
};
use crate::services::notifier::{LogNotifier, PasswordResetNotifier};
use crate::services::token::TokenService;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Password reset form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordReset {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
}

/// A customer together with a freshly issued token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub customer: Customer,
    pub token: String,
}

/// Authentication service.
///
/// Borrowed from application state per request.
pub struct AuthService<'a> {
    customers: &'a dyn CustomerRepository,
    identities: &'a dyn AuthIdentityRepository,
    tokens: &'a TokenService,
    notifier: &'a dyn PasswordResetNotifier,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service that logs reset requests.
    #[must_use]
    pub const fn new(
        customers: &'a dyn CustomerRepository,
        identities: &'a dyn AuthIdentityRepository,
        tokens: &'a TokenService,
    ) -> Self {
        Self {
            customers,
            identities,
            tokens,
            notifier: &LogNotifier,
        }
    }

    /// Deliver reset tokens through `notifier`.
    #[must_use]
    pub const fn with_notifier(mut self, notifier: &'a dyn PasswordResetNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Register a new customer with email and password.
    ///
    /// Creates the identity, then the customer carrying the identity
    /// back-reference, then records `email`/`customer_id` on the identity.
    /// An identity left behind by an earlier attempt that never got a
    /// customer is taken over, with its password replaced.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if any field is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<AuthSession, AuthError> {
        let (email, first_name, last_name) = validate_registration(registration)?;
        let password_hash = hash_password(&registration.password)?;

        let mut app_metadata = Metadata::new();
        app_metadata.insert(metadata_keys::EMAIL.to_owned(), email.as_str().into());
        let created = self
            .identities
            .create_auth_identity(NewAuthIdentity {
                provider: EMAILPASS_PROVIDER.to_owned(),
                entity_id: email.as_str().to_owned(),
                password_hash: password_hash.clone(),
                app_metadata,
            })
            .await;
        let identity = match created {
            Ok(identity) => identity,
            Err(RepositoryError::Conflict(_)) => {
                self.adopt_orphaned_identity(&email, &password_hash).await?
            }
            Err(e) => return Err(e.into()),
        };

        let mut metadata = Metadata::new();
        metadata.insert(
            metadata_keys::AUTH_IDENTITY_ID.to_owned(),
            identity.id.as_str().into(),
        );
        let customer = self
            .customers
            .create_customer(NewCustomer {
                email: email.clone(),
                first_name,
                last_name,
                metadata,
            })
            .await?;

        let mut link = Metadata::new();
        link.insert(
            metadata_keys::CUSTOMER_ID.to_owned(),
            customer.id.as_str().into(),
        );
        self.identities
            .update_app_metadata(&identity.id, link)
            .await?;

        tracing::info!(customer_id = %customer.id, identity_id = %identity.id, "Customer registered");

        let token = self
            .tokens
            .issue_for_identity(&identity.id, &customer.id, &customer.email)?;
        Ok(AuthSession { customer, token })
    }

    /// Login with email and password.
    ///
    /// Stamps `metadata.last_login` on success; a failed stamp is logged and
    /// does not fail the login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or no customer is linked to the identity.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let identity = self
            .identities
            .find_by_entity_id(EMAILPASS_PROVIDER, email.as_str())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &identity.password_hash)?;

        let customer = self
            .linked_customer(&identity, &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let customer = match self.stamp(&customer.id, metadata_keys::LAST_LOGIN).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(customer_id = %customer.id, error = %e, "Failed to record last login");
                customer
            }
        };

        let token = self
            .tokens
            .issue_for_identity(&identity.id, &customer.id, &customer.email)?;
        Ok(AuthSession { customer, token })
    }

    /// Record a logout. Failures are logged only.
    pub async fn logout(&self, customer_id: &CustomerId) {
        if let Err(e) = self.stamp(customer_id, metadata_keys::LAST_LOGOUT).await {
            tracing::warn!(%customer_id, error = %e, "Failed to record logout");
        }
    }

    /// Start a password reset for `email`.
    ///
    /// Succeeds whether or not an account exists. Lookup, signing and
    /// delivery failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the email is malformed.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email).map_err(|_| {
            AuthError::Validation(vec![FieldError::new("email", "Invalid email address")])
        })?;

        let identity = match self
            .identities
            .find_by_entity_id(EMAILPASS_PROVIDER, email.as_str())
            .await
        {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::debug!("Password reset requested for unknown email");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password reset lookup failed");
                return Ok(());
            }
        };

        let fingerprint = hash_fingerprint(&identity.password_hash);
        let token = match self
            .tokens
            .issue_password_reset(&identity.id, &email, &fingerprint)
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(identity_id = %identity.id, error = %e, "Failed to issue reset token");
                return Ok(());
            }
        };

        if let Err(e) = self.notifier.send_password_reset(&email, &token).await {
            tracing::warn!(identity_id = %identity.id, error = %e, "Failed to deliver reset token");
        }
        Ok(())
    }

    /// Set a new password using a reset token.
    ///
    /// A token is good for one reset: the new hash no longer matches the
    /// fingerprint it carries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for malformed input and
    /// `AuthError::InvalidResetToken` if the token is bad, expired, already
    /// used, or issued for another email.
    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), AuthError> {
        let email = validate_password_reset(reset)?;

        let claims = self
            .tokens
            .verify_password_reset(reset.token.trim())
            .map_err(|e| {
                tracing::debug!(error = %e, "Reset token rejected");
                AuthError::InvalidResetToken
            })?;
        if claims.email != email.as_str() {
            return Err(AuthError::InvalidResetToken);
        }

        let identity_id = AuthIdentityId::from(claims.auth_identity_id.as_str());
        let identity = self
            .identities
            .retrieve_auth_identity(&identity_id)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;
        if identity.entity_id != email.as_str()
            || hash_fingerprint(&identity.password_hash) != claims.fpr
        {
            return Err(AuthError::InvalidResetToken);
        }

        let password_hash = hash_password(&reset.password)?;
        self.identities
            .update_password_hash(&identity.id, &password_hash)
            .await?;

        tracing::info!(identity_id = %identity.id, "Password reset");
        Ok(())
    }

    /// Take over an identity whose registration failed before a customer
    /// was created. Any identity with a customer stays taken.
    async fn adopt_orphaned_identity(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<AuthIdentity, AuthError> {
        let identity = self
            .identities
            .find_by_entity_id(EMAILPASS_PROVIDER, email.as_str())
            .await?
            .ok_or(AuthError::UserAlreadyExists)?;
        if self.linked_customer(&identity, email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let identity = self
            .identities
            .update_password_hash(&identity.id, password_hash)
            .await?;
        tracing::warn!(identity_id = %identity.id, "Adopting identity left without a customer");
        Ok(identity)
    }

    async fn linked_customer(
        &self,
        identity: &AuthIdentity,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        if let Some(customer_id) = identity.customer_id()
            && let Some(customer) = self.customers.retrieve_customer(&customer_id).await?
        {
            return Ok(Some(customer));
        }

        let customers = self
            .customers
            .list_customers(&CustomerFilter::by_email(email.clone()))
            .await?;
        Ok(customers.into_iter().next())
    }

    async fn stamp(&self, customer_id: &CustomerId, key: &str) -> Result<Customer, RepositoryError> {
        let mut patch = Metadata::new();
        avara_core::types::metadata::stamp(&mut patch, key, Utc::now());
        self.customers
            .update_customer(customer_id, CustomerPatch::metadata(patch))
            .await
    }
}

/// Validate a registration form, returning the normalized email and split name.
fn validate_registration(
    registration: &Registration,
) -> Result<(Email, String, String), AuthError> {
    let mut errors = Vec::new();

    let name = registration.name.trim();
    let name_length = name.chars().count();
    if name_length < MIN_NAME_LENGTH {
        errors.push(FieldError::new("name", "Name must be at least 2 characters"));
    } else if name_length > MAX_NAME_LENGTH {
        errors.push(FieldError::new("name", "Name too long"));
    }

    let email = match Email::parse(&registration.email) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.push(FieldError::new("email", "Invalid email address"));
            None
        }
    };

    errors.extend(
        validate_password(&registration.password)
            .into_iter()
            .map(|message| FieldError::new("password", message)),
    );

    match email {
        Some(email) if errors.is_empty() => {
            let (first_name, last_name) = split_name(name);
            Ok((email, first_name, last_name))
        }
        _ => Err(AuthError::Validation(errors)),
    }
}

/// Validate a password reset form, returning the normalized email.
fn validate_password_reset(reset: &PasswordReset) -> Result<Email, AuthError> {
    let mut errors = Vec::new();

    let email = match Email::parse(&reset.email) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.push(FieldError::new("email", "Invalid email address"));
            None
        }
    };
    errors.extend(
        validate_password(&reset.password)
            .into_iter()
            .map(|message| FieldError::new("password", message)),
    );
    if reset.token.trim().is_empty() {
        errors.push(FieldError::new("token", "Reset token is required"));
    }

    match email {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(AuthError::Validation(errors)),
    }
}

/// Salt of a PHC hash string; empty if the hash does not parse.
fn hash_fingerprint(hash: &str) -> String {
    PasswordHash::new(hash)
        .ok()
        .and_then(|parsed| parsed.salt)
        .map(|salt| salt.as_str().to_owned())
        .unwrap_or_default()
}

/// First word is the first name, the rest is the last name.
fn split_name(name: &str) -> (String, String) {
    let mut words = name.split_whitespace();
    let first = words.next().unwrap_or_default().to_owned();
    let rest = words.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Validate password meets requirements, returning one message per failure.
fn validate_password(password: &str) -> Vec<&'static str> {
    let mut failures = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        failures.push("Password must be at least 8 characters");
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        failures.push(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        );
    }
    failures
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
