//! Data services for customers and auth identities.
//!
//! Handlers and the resolver talk to the [`CustomerRepository`] and
//! [`AuthIdentityRepository`] traits; two backends implement them:
//!
//! - [`memory`] - `tokio::sync::RwLock`-guarded maps, used by tests and when
//!   no database URL is configured
//! - [`postgres`] - `PostgreSQL` via sqlx, tables in the `store` schema
//!
//! # Migrations
//!
//! Migrations are stored in `crates/store-api/migrations/` and run via:
//! ```bash
//! cargo run -p avara-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use avara_core::{AuthIdentityId, CustomerId, Metadata};

use crate::models::{AuthIdentity, Customer, CustomerFilter, CustomerPatch, NewAuthIdentity, NewCustomer};

pub use memory::{InMemoryAuthIdentityRepository, InMemoryCustomerRepository};
pub use postgres::{PgAuthIdentityRepository, PgCustomerRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate login).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// One page of a full customer scan.
#[derive(Debug, Default)]
pub struct CustomerPage {
    /// Customers that decoded cleanly, oldest first.
    pub customers: Vec<Customer>,
    /// Records read from storage, including any that were skipped.
    pub rows_read: usize,
}

/// Customer storage.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Fetch one customer by id.
    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// List customers matching `filter`, oldest first.
    async fn list_customers(&self, filter: &CustomerFilter)
    -> Result<Vec<Customer>, RepositoryError>;

    /// Read one page of all customers, oldest first, for full scans.
    ///
    /// A record that cannot be decoded is skipped with a warning instead of
    /// failing the page. Page by `rows_read`, not by `customers.len()`.
    async fn scan_customers(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<CustomerPage, RepositoryError> {
        let customers = self
            .list_customers(&CustomerFilter::page(offset, limit))
            .await?;
        Ok(CustomerPage {
            rows_read: customers.len(),
            customers,
        })
    }

    /// Create a customer with a freshly minted id.
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError>;

    /// Apply a partial update.
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    async fn update_customer(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, RepositoryError>;
}

/// Auth identity storage.
#[async_trait]
pub trait AuthIdentityRepository: Send + Sync {
    /// Fetch one identity by id.
    async fn retrieve_auth_identity(
        &self,
        id: &AuthIdentityId,
    ) -> Result<Option<AuthIdentity>, RepositoryError>;

    /// Find the identity a provider knows under `entity_id`.
    async fn find_by_entity_id(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>, RepositoryError>;

    /// Create an identity.
    ///
    /// Returns `RepositoryError::Conflict` if `(provider, entity_id)` is taken.
    async fn create_auth_identity(
        &self,
        identity: NewAuthIdentity,
    ) -> Result<AuthIdentity, RepositoryError>;

    /// Merge `metadata` into the identity's `app_metadata`.
    ///
    /// Returns `RepositoryError::NotFound` if the identity does not exist.
    async fn update_app_metadata(
        &self,
        id: &AuthIdentityId,
        metadata: Metadata,
    ) -> Result<AuthIdentity, RepositoryError>;

    /// Replace the stored password hash.
    ///
    /// Returns `RepositoryError::NotFound` if the identity does not exist.
    async fn update_password_hash(
        &self,
        id: &AuthIdentityId,
        password_hash: &str,
    ) -> Result<AuthIdentity, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
