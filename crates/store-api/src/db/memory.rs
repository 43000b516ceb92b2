//! In-memory repositories.
//!
//! Customers are kept in insertion order so paginated listing matches the
//! `created_at, id` ordering of the `PostgreSQL` backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use avara_core::{AuthIdentityId, CustomerId, Metadata};

use super::{AuthIdentityRepository, CustomerRepository, RepositoryError};
use crate::models::customer::merge_metadata;
use crate::models::{
    AuthIdentity, Customer, CustomerFilter, CustomerPatch, NewAuthIdentity, NewCustomer,
};

/// Customers held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<Vec<Customer>>,
}

impl InMemoryCustomerRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing customers, keeping their ids and timestamps.
    #[must_use]
    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        Self {
            customers: RwLock::new(customers.into_iter().collect()),
        }
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.iter().find(|c| &c.id == id).cloned())
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        let matching = customers
            .iter()
            .filter(|c| filter.email.as_ref().is_none_or(|email| &c.email == email))
            .skip(filter.offset);

        Ok(match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let now = Utc::now();
        let created = Customer {
            id: CustomerId::generate(),
            email: customer.email,
            first_name: customer.first_name,
            last_name: customer.last_name,
            metadata: customer.metadata,
            created_at: now,
            updated_at: now,
        };

        self.customers.write().await.push(created.clone());
        Ok(created)
    }

    async fn update_customer(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, RepositoryError> {
        let mut customers = self.customers.write().await;
        let customer = customers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or(RepositoryError::NotFound)?;

        patch.apply(customer, Utc::now());
        Ok(customer.clone())
    }
}

/// Auth identities held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuthIdentityRepository {
    identities: RwLock<HashMap<AuthIdentityId, AuthIdentity>>,
}

impl InMemoryAuthIdentityRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing identities.
    #[must_use]
    pub fn with_identities(identities: impl IntoIterator<Item = AuthIdentity>) -> Self {
        Self {
            identities: RwLock::new(
                identities
                    .into_iter()
                    .map(|identity| (identity.id.clone(), identity))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl AuthIdentityRepository for InMemoryAuthIdentityRepository {
    async fn retrieve_auth_identity(
        &self,
        id: &AuthIdentityId,
    ) -> Result<Option<AuthIdentity>, RepositoryError> {
        Ok(self.identities.read().await.get(id).cloned())
    }

    async fn find_by_entity_id(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>, RepositoryError> {
        let identities = self.identities.read().await;
        Ok(identities
            .values()
            .find(|i| i.provider == provider && i.entity_id == entity_id)
            .cloned())
    }

    async fn create_auth_identity(
        &self,
        identity: NewAuthIdentity,
    ) -> Result<AuthIdentity, RepositoryError> {
        let mut identities = self.identities.write().await;
        if identities
            .values()
            .any(|i| i.provider == identity.provider && i.entity_id == identity.entity_id)
        {
            return Err(RepositoryError::Conflict(
                "auth identity already exists".to_owned(),
            ));
        }

        let created = AuthIdentity {
            id: AuthIdentityId::generate(),
            provider: identity.provider,
            entity_id: identity.entity_id,
            password_hash: identity.password_hash,
            app_metadata: identity.app_metadata,
            created_at: Utc::now(),
        };
        identities.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_app_metadata(
        &self,
        id: &AuthIdentityId,
        metadata: Metadata,
    ) -> Result<AuthIdentity, RepositoryError> {
        let mut identities = self.identities.write().await;
        let identity = identities.get_mut(id).ok_or(RepositoryError::NotFound)?;
        merge_metadata(&mut identity.app_metadata, metadata);
        Ok(identity.clone())
    }

    async fn update_password_hash(
        &self,
        id: &AuthIdentityId,
        password_hash: &str,
    ) -> Result<AuthIdentity, RepositoryError> {
        let mut identities = self.identities.write().await;
        let identity = identities.get_mut(id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(&mut identity.password_hash);
        Ok(identity.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use avara_core::Email;

    use super::*;
    use crate::models::EMAILPASS_PROVIDER;

    fn new_customer(email: &str) -> NewCustomer {
        NewCustomer {
            email: Email::parse(email).unwrap(),
            first_name: "Test".into(),
            last_name: "Customer".into(),
            metadata: Metadata::new(),
        }
    }

    fn new_identity(email: &str) -> NewAuthIdentity {
        NewAuthIdentity {
            provider: EMAILPASS_PROVIDER.into(),
            entity_id: email.into(),
            password_hash: "hash".into(),
            app_metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_customer_create_retrieve_update() {
        let repo = InMemoryCustomerRepository::new();
        let created = repo.create_customer(new_customer("a@avara.shop")).await.unwrap();
        assert!(created.id.as_str().starts_with("cus_"));

        let fetched = repo.retrieve_customer(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let mut metadata = Metadata::new();
        metadata.insert("last_login".into(), json!("2026-10-16T00:00:00.000Z"));
        let updated = repo
            .update_customer(&created.id, CustomerPatch::metadata(metadata))
            .await
            .unwrap();
        assert_eq!(updated.metadata["last_login"], json!("2026-10-16T00:00:00.000Z"));

        let missing = repo
            .update_customer(&CustomerId::new("cus_missing"), CustomerPatch::default())
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_customers_filters_and_paginates() {
        let repo = InMemoryCustomerRepository::new();
        for email in ["a@avara.shop", "b@avara.shop", "a@avara.shop", "c@avara.shop"] {
            repo.create_customer(new_customer(email)).await.unwrap();
        }

        let by_email = repo
            .list_customers(&CustomerFilter {
                email: Some(Email::parse("a@avara.shop").unwrap()),
                ..CustomerFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_email.len(), 2);

        let page = repo.list_customers(&CustomerFilter::page(1, 2)).await.unwrap();
        let emails: Vec<&str> = page.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, ["b@avara.shop", "a@avara.shop"]);

        let tail = repo.list_customers(&CustomerFilter::page(3, 2)).await.unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[tokio::test]
    async fn test_identity_conflict_and_metadata_merge() {
        let repo = InMemoryAuthIdentityRepository::new();
        let created = repo.create_auth_identity(new_identity("a@avara.shop")).await.unwrap();

        let duplicate = repo.create_auth_identity(new_identity("a@avara.shop")).await;
        assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

        let found = repo
            .find_by_entity_id(EMAILPASS_PROVIDER, "a@avara.shop")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        let mut metadata = Metadata::new();
        metadata.insert("customer_id".into(), json!("cus_1"));
        let updated = repo.update_app_metadata(&created.id, metadata).await.unwrap();
        assert_eq!(updated.customer_id(), Some(CustomerId::new("cus_1")));

        let missing = repo
            .update_app_metadata(&AuthIdentityId::new("authid_missing"), Metadata::new())
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }
}
