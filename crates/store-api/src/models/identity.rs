//! Auth identity domain types.
//!
//! An auth identity holds login credentials and is separate from the
//! customer record it eventually links to.

use chrono::{DateTime, Utc};

use avara_core::{AuthIdentityId, CustomerId, Email, Metadata, metadata_keys};

/// Provider name for email + password identities.
pub const EMAILPASS_PROVIDER: &str = "emailpass";

/// A stored auth identity.
///
/// Implements `Debug` manually to redact the password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub id: AuthIdentityId,
    /// Provider the credentials belong to (`emailpass`).
    pub provider: String,
    /// Provider-scoped login name; the normalized email for `emailpass`.
    pub entity_id: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Provider-managed metadata (`email`, `customer_id`).
    pub app_metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for AuthIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthIdentity")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("entity_id", &self.entity_id)
            .field("password_hash", &"[REDACTED]")
            .field("app_metadata", &self.app_metadata)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl AuthIdentity {
    /// Email recorded in `app_metadata`, if present and well formed.
    #[must_use]
    pub fn email(&self) -> Option<Email> {
        avara_core::types::metadata::get_str(&self.app_metadata, metadata_keys::EMAIL)
            .and_then(|raw| Email::parse(raw).ok())
    }

    /// Customer linked through `app_metadata`, if any.
    #[must_use]
    pub fn customer_id(&self) -> Option<CustomerId> {
        avara_core::types::metadata::get_str(&self.app_metadata, metadata_keys::CUSTOMER_ID)
            .map(CustomerId::from)
    }
}

/// Fields for creating an auth identity.
#[derive(Clone)]
pub struct NewAuthIdentity {
    pub provider: String,
    pub entity_id: String,
    pub password_hash: String,
    pub app_metadata: Metadata,
}

impl std::fmt::Debug for NewAuthIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAuthIdentity")
            .field("provider", &self.provider)
            .field("entity_id", &self.entity_id)
            .field("password_hash", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
