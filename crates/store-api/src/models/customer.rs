//! Customer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use avara_core::{AuthIdentityId, CustomerId, Email, Metadata, metadata_keys};

/// A store customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    /// Unique customer ID.
    pub id: CustomerId,
    /// Contact email. Not unique across customers.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    /// Free-form metadata (identity back-reference, login stamps, orders).
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Identity back-reference stored in metadata, if any.
    #[must_use]
    pub fn auth_identity_id(&self) -> Option<AuthIdentityId> {
        avara_core::types::metadata::get_str(&self.metadata, metadata_keys::AUTH_IDENTITY_ID)
            .map(AuthIdentityId::from)
    }
}

/// Fields for creating a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub metadata: Metadata,
}

/// Partial update for a customer.
///
/// `None` fields are left untouched. Metadata is merged key by key: a key
/// mapped to JSON `null` is removed, any other value replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub metadata: Option<Metadata>,
}

impl CustomerPatch {
    /// Patch that only merges metadata.
    #[must_use]
    pub fn metadata(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.metadata.is_none()
    }

    /// Apply the patch to `customer`, stamping `updated_at` with `now`.
    pub fn apply(self, customer: &mut Customer, now: DateTime<Utc>) {
        if let Some(email) = self.email {
            customer.email = email;
        }
        if let Some(first_name) = self.first_name {
            customer.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            customer.last_name = last_name;
        }
        if let Some(metadata) = self.metadata {
            merge_metadata(&mut customer.metadata, metadata);
        }
        customer.updated_at = now;
    }
}

/// Merge `patch` into `target`; `null` values delete keys.
pub fn merge_metadata(target: &mut Metadata, patch: Metadata) {
    for (key, value) in patch {
        if value == Value::Null {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Filter for listing customers.
///
/// Results are ordered by creation time, then id, so `offset`/`limit`
/// pagination is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    /// Exact (normalized) email match.
    pub email: Option<Email>,
    /// Number of matching customers to skip.
    pub offset: usize,
    /// Maximum number of customers to return; `None` for all.
    pub limit: Option<usize>,
}

impl CustomerFilter {
    /// First customer with the given email.
    #[must_use]
    pub fn by_email(email: Email) -> Self {
        Self {
            email: Some(email),
            offset: 0,
            limit: Some(1),
        }
    }

    /// One page of all customers.
    #[must_use]
    pub const fn page(offset: usize, limit: usize) -> Self {
        Self {
            email: None,
            offset,
            limit: Some(limit),
        }
    }
}

/// Identity attached to an authenticated request.
///
/// Lives only in request extensions; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedCustomer {
    pub customer_id: CustomerId,
    pub email: Email,
}

impl From<&Customer> for AuthenticatedCustomer {
    fn from(customer: &Customer) -> Self {
        Self {
            customer_id: customer.id.clone(),
            email: customer.email.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn customer() -> Customer {
        let mut metadata = Metadata::new();
        metadata.insert("auth_identity_id".into(), json!("authid_1"));
        metadata.insert("keep".into(), json!(true));
        Customer {
            id: CustomerId::new("cus_1"),
            email: Email::parse("jane@avara.shop").unwrap(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            metadata,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_patch_merges_metadata_and_deletes_nulls() {
        let mut customer = customer();
        let mut metadata = Metadata::new();
        metadata.insert("last_login".into(), json!("2026-01-01T00:00:00.000Z"));
        metadata.insert("keep".into(), Value::Null);

        let now = Utc::now();
        CustomerPatch::metadata(metadata).apply(&mut customer, now);

        assert_eq!(customer.metadata.get("last_login"), Some(&json!("2026-01-01T00:00:00.000Z")));
        assert!(!customer.metadata.contains_key("keep"));
        assert_eq!(customer.auth_identity_id(), Some(AuthIdentityId::new("authid_1")));
        assert_eq!(customer.updated_at, now);
    }

    #[test]
    fn test_patch_updates_names_only_when_given() {
        let mut customer = customer();
        let patch = CustomerPatch {
            last_name: Some("Smith".into()),
            ..CustomerPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut customer, Utc::now());

        assert_eq!(customer.first_name, "Jane");
        assert_eq!(customer.last_name, "Smith");
        assert!(CustomerPatch::default().is_empty());
    }

    #[test]
    fn test_blank_identity_reference_is_ignored() {
        let mut customer = customer();
        customer.metadata.insert("auth_identity_id".into(), json!("  "));
        assert_eq!(customer.auth_identity_id(), None);
    }
}
