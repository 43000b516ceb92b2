//! Identity link backfill.
//!
//! Customers created before identities carried `email`/`customer_id` in
//! their app metadata can only be resolved by the legacy scan. Walking the
//! customers once and writing those keys onto each referenced identity makes
//! the identity-email step succeed for them, after which the scan can be
//! switched off.

use tracing::{debug, info, warn};

use avara_core::{Metadata, metadata_keys};

use crate::db::{AuthIdentityRepository, CustomerRepository, RepositoryError};
use crate::models::Customer;

/// Outcome counters for a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Customers read.
    pub scanned: usize,
    /// Identities whose app metadata was (or would be) written.
    pub linked: usize,
    /// Identities that already carried both keys.
    pub already_linked: usize,
    /// Customers pointing at an identity that does not exist.
    pub missing_identity: usize,
}

/// Write `email` and `customer_id` onto every identity referenced by a
/// customer's `metadata.auth_identity_id`.
///
/// With `dry_run` nothing is written; the report counts what would change.
///
/// # Errors
///
/// Returns the first repository error. Identities updated before the
/// failure stay updated, so the run can simply be repeated.
pub async fn backfill_identity_links(
    customers: &dyn CustomerRepository,
    identities: &dyn AuthIdentityRepository,
    page_size: usize,
    dry_run: bool,
) -> Result<BackfillReport, RepositoryError> {
    let page_size = page_size.max(1);
    let mut report = BackfillReport::default();
    let mut offset = 0;

    loop {
        let page = customers.scan_customers(offset, page_size).await?;
        report.scanned += page.customers.len();

        for customer in &page.customers {
            link_customer(identities, customer, dry_run, &mut report).await?;
        }

        if page.rows_read < page_size {
            break;
        }
        offset += page.rows_read;
    }

    info!(
        scanned = report.scanned,
        linked = report.linked,
        already_linked = report.already_linked,
        missing_identity = report.missing_identity,
        dry_run,
        "Identity link backfill finished"
    );
    Ok(report)
}

async fn link_customer(
    identities: &dyn AuthIdentityRepository,
    customer: &Customer,
    dry_run: bool,
    report: &mut BackfillReport,
) -> Result<(), RepositoryError> {
    let Some(identity_id) = customer.auth_identity_id() else {
        return Ok(());
    };

    let Some(identity) = identities.retrieve_auth_identity(&identity_id).await? else {
        warn!(customer_id = %customer.id, %identity_id, "Customer references a missing identity");
        report.missing_identity += 1;
        return Ok(());
    };

    if identity.email().as_ref() == Some(&customer.email)
        && identity.customer_id().as_ref() == Some(&customer.id)
    {
        report.already_linked += 1;
        return Ok(());
    }

    report.linked += 1;
    if dry_run {
        debug!(customer_id = %customer.id, %identity_id, "Would link identity");
        return Ok(());
    }

    let mut patch = Metadata::new();
    patch.insert(metadata_keys::EMAIL.to_owned(), customer.email.as_str().into());
    patch.insert(
        metadata_keys::CUSTOMER_ID.to_owned(),
        customer.id.as_str().into(),
    );
    identities.update_app_metadata(&identity_id, patch).await?;
    debug!(customer_id = %customer.id, %identity_id, "Linked identity");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};

    use avara_core::{AuthIdentityId, CustomerId, Email};

    use super::*;
    use crate::db::{InMemoryAuthIdentityRepository, InMemoryCustomerRepository};
    use crate::models::{AuthIdentity, EMAILPASS_PROVIDER};

    fn customer(id: &str, email: &str, identity: Option<&str>) -> Customer {
        let mut metadata = Metadata::new();
        if let Some(identity) = identity {
            metadata.insert(metadata_keys::AUTH_IDENTITY_ID.to_owned(), identity.into());
        }
        Customer {
            id: CustomerId::new(id),
            email: Email::parse(email).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            metadata,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn identity(id: &str, app_metadata: Metadata) -> AuthIdentity {
        AuthIdentity {
            id: AuthIdentityId::new(id),
            provider: EMAILPASS_PROVIDER.to_owned(),
            entity_id: format!("{id}@example.com"),
            password_hash: String::new(),
            app_metadata,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn linked_metadata(email: &str, customer_id: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(metadata_keys::EMAIL.to_owned(), email.into());
        metadata.insert(metadata_keys::CUSTOMER_ID.to_owned(), customer_id.into());
        metadata
    }

    fn fixture() -> (InMemoryCustomerRepository, InMemoryAuthIdentityRepository) {
        let customers = InMemoryCustomerRepository::with_customers([
            customer("cus_1", "one@example.com", Some("authid_1")),
            customer("cus_2", "two@example.com", Some("authid_2")),
            customer("cus_3", "three@example.com", None),
            customer("cus_4", "four@example.com", Some("authid_gone")),
        ]);
        let identities = InMemoryAuthIdentityRepository::with_identities([
            identity("authid_1", Metadata::new()),
            identity("authid_2", linked_metadata("two@example.com", "cus_2")),
        ]);
        (customers, identities)
    }

    #[tokio::test]
    async fn test_backfill_links_identities() {
        let (customers, identities) = fixture();

        let report = backfill_identity_links(&customers, &identities, 3, false)
            .await
            .unwrap();

        assert_eq!(
            report,
            BackfillReport {
                scanned: 4,
                linked: 1,
                already_linked: 1,
                missing_identity: 1,
            }
        );

        let identity = identities
            .retrieve_auth_identity(&AuthIdentityId::new("authid_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.email().unwrap().as_str(), "one@example.com");
        assert_eq!(identity.customer_id().unwrap().as_str(), "cus_1");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let (customers, identities) = fixture();

        let report = backfill_identity_links(&customers, &identities, 100, true)
            .await
            .unwrap();
        assert_eq!(report.linked, 1);

        let identity = identities
            .retrieve_auth_identity(&AuthIdentityId::new("authid_1"))
            .await
            .unwrap()
            .unwrap();
        assert!(identity.app_metadata.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let (customers, identities) = fixture();

        backfill_identity_links(&customers, &identities, 2, false)
            .await
            .unwrap();
        let report = backfill_identity_links(&customers, &identities, 2, false)
            .await
            .unwrap();

        assert_eq!(report.linked, 0);
        assert_eq!(report.already_linked, 2);
    }
}
