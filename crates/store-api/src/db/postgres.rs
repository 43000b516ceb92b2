//! `PostgreSQL` repositories.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database. Metadata columns are `JSONB`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::warn;

use avara_core::{AuthIdentityId, CustomerId, Email, Metadata};

use super::{AuthIdentityRepository, CustomerPage, CustomerRepository, RepositoryError};
use crate::models::customer::merge_metadata;
use crate::models::{
    AuthIdentity, Customer, CustomerFilter, CustomerPatch, NewAuthIdentity, NewCustomer,
};

const CUSTOMER_COLUMNS: &str =
    "id, email, first_name, last_name, metadata, created_at, updated_at";
const IDENTITY_COLUMNS: &str =
    "id, provider, entity_id, password_hash, app_metadata, created_at";

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthIdentityRow {
    id: String,
    provider: String,
    entity_id: String,
    password_hash: String,
    app_metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
}

impl From<AuthIdentityRow> for AuthIdentity {
    fn from(row: AuthIdentityRow) -> Self {
        Self {
            id: AuthIdentityId::new(row.id),
            provider: row.provider,
            entity_id: row.entity_id,
            password_hash: row.password_hash,
            app_metadata: row.app_metadata.0,
            created_at: row.created_at,
        }
    }
}

/// Decode a scan page, skipping rows that no longer satisfy the model.
fn decode_scan_page(rows: Vec<CustomerRow>) -> CustomerPage {
    let rows_read = rows.len();
    let customers = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            Customer::try_from(row)
                .inspect_err(|e| warn!(customer_id = %id, error = %e, "Skipping undecodable customer"))
                .ok()
        })
        .collect();

    CustomerPage {
        customers,
        rows_read,
    }
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Customers stored in `store.customer`.
#[derive(Debug, Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM store.customer WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
    ) -> Result<Vec<Customer>, RepositoryError> {
        // LIMIT NULL returns every row.
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM store.customer
            WHERE ($1::text IS NULL OR email = $1)
            ORDER BY created_at, id
            OFFSET $2
            LIMIT $3
            "
        ))
        .bind(filter.email.as_ref().map(Email::as_str))
        .bind(to_i64(filter.offset))
        .bind(filter.limit.map(to_i64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    async fn scan_customers(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<CustomerPage, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM store.customer
            ORDER BY created_at, id
            OFFSET $1
            LIMIT $2
            "
        ))
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_scan_page(rows))
    }

    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO store.customer (id, email, first_name, last_name, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(CustomerId::generate().as_str())
        .bind(customer.email.as_str())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(Json(&customer.metadata))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "customer"))?;

        Customer::try_from(row)
    }

    async fn update_customer(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, RepositoryError> {
        // Read-modify-write under a row lock so concurrent metadata merges
        // do not drop each other's keys.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM store.customer WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut customer = Customer::try_from(row)?;
        patch.apply(&mut customer, Utc::now());

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE store.customer
            SET email = $2, first_name = $3, last_name = $4, metadata = $5, updated_at = $6
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(customer.id.as_str())
        .bind(customer.email.as_str())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(Json(&customer.metadata))
        .bind(customer.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Customer::try_from(row)
    }
}

/// Auth identities stored in `store.auth_identity`.
#[derive(Debug, Clone)]
pub struct PgAuthIdentityRepository {
    pool: PgPool,
}

impl PgAuthIdentityRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthIdentityRepository for PgAuthIdentityRepository {
    async fn retrieve_auth_identity(
        &self,
        id: &AuthIdentityId,
    ) -> Result<Option<AuthIdentity>, RepositoryError> {
        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM store.auth_identity WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthIdentity::from))
    }

    async fn find_by_entity_id(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>, RepositoryError> {
        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM store.auth_identity WHERE provider = $1 AND entity_id = $2"
        ))
        .bind(provider)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthIdentity::from))
    }

    async fn create_auth_identity(
        &self,
        identity: NewAuthIdentity,
    ) -> Result<AuthIdentity, RepositoryError> {
        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            r"
            INSERT INTO store.auth_identity (id, provider, entity_id, password_hash, app_metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {IDENTITY_COLUMNS}
            "
        ))
        .bind(AuthIdentityId::generate().as_str())
        .bind(&identity.provider)
        .bind(&identity.entity_id)
        .bind(&identity.password_hash)
        .bind(Json(&identity.app_metadata))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "auth identity"))?;

        Ok(AuthIdentity::from(row))
    }

    async fn update_app_metadata(
        &self,
        id: &AuthIdentityId,
        metadata: Metadata,
    ) -> Result<AuthIdentity, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM store.auth_identity WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut app_metadata = row.app_metadata.0;
        merge_metadata(&mut app_metadata, metadata);

        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            r"
            UPDATE store.auth_identity
            SET app_metadata = $2
            WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}
            "
        ))
        .bind(id.as_str())
        .bind(Json(&app_metadata))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AuthIdentity::from(row))
    }

    async fn update_password_hash(
        &self,
        id: &AuthIdentityId,
        password_hash: &str,
    ) -> Result<AuthIdentity, RepositoryError> {
        let row = sqlx::query_as::<_, AuthIdentityRow>(&format!(
            r"
            UPDATE store.auth_identity
            SET password_hash = $2
            WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}
            "
        ))
        .bind(id.as_str())
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(AuthIdentity::from(row))
    }
}
