//! Customer resolution: token claims to a customer record.
//!
//! Steps run in order and the first hit wins:
//!
//! 1. direct `customer_id` from the token
//! 2. the auth identity's `app_metadata.email`, matched against customer emails
//! 3. a paginated scan for `metadata.auth_identity_id`, when enabled
//!
//! Every lookup is bounded by a timeout, and the scan as a whole shares one
//! deadline of the same length however many pages it reads. A failed or
//! timed-out lookup is logged and treated as a miss, so the chain keeps
//! going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use avara_core::AuthIdentityId;

use crate::config::AuthLookupConfig;
use crate::db::{AuthIdentityRepository, CustomerRepository, RepositoryError};
use crate::models::{AuthenticatedCustomer, Customer, CustomerFilter};
use crate::services::token::{TokenClaims, TokenError};

/// Why a request could not be tied to a customer.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No usable bearer token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Token rejected by the token service.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    /// Every step came back empty.
    #[error("no customer matches the token")]
    IdentityResolutionFailed,
    /// Every step came back empty and at least one lookup failed.
    #[error("customer lookup failed: {0}")]
    UpstreamLookup(String),
}

/// Which step found the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    DirectCustomer,
    IdentityEmail,
    LegacyScan,
}

/// A resolved customer and the step that found it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub customer: Customer,
    pub step: ResolutionStep,
}

impl Resolved {
    /// Identity to attach to the request.
    #[must_use]
    pub fn authenticated(&self) -> AuthenticatedCustomer {
        AuthenticatedCustomer::from(&self.customer)
    }
}

#[derive(Debug, Error)]
enum LookupError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves token claims against the customer and identity repositories.
#[derive(Clone)]
pub struct CustomerResolver {
    customers: Arc<dyn CustomerRepository>,
    identities: Arc<dyn AuthIdentityRepository>,
    options: AuthLookupConfig,
}

impl CustomerResolver {
    #[must_use]
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        identities: Arc<dyn AuthIdentityRepository>,
        options: AuthLookupConfig,
    ) -> Self {
        Self {
            customers,
            identities,
            options,
        }
    }

    /// Resolve verified claims to a customer.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::UpstreamLookup` if nothing matched and at
    /// least one lookup failed, otherwise `ResolveError::IdentityResolutionFailed`.
    pub async fn resolve(&self, claims: &TokenClaims) -> Result<Resolved, ResolveError> {
        let mut last_failure: Option<String> = None;

        if let Some(customer_id) = claims.customer_id() {
            let outcome = self
                .bounded(self.customers.retrieve_customer(&customer_id))
                .await;
            match outcome {
                Ok(Some(customer)) => return Ok(found(customer, ResolutionStep::DirectCustomer)),
                Ok(None) => debug!(%customer_id, "Token customer not found"),
                Err(e) => {
                    warn!(%customer_id, error = %e, "Customer lookup failed");
                    last_failure = Some(e.to_string());
                }
            }
        }

        if let Some(identity_id) = claims.auth_identity_id() {
            match self.by_identity_email(&identity_id).await {
                Ok(Some(customer)) => return Ok(found(customer, ResolutionStep::IdentityEmail)),
                Ok(None) => debug!(%identity_id, "No customer for identity email"),
                Err(e) => {
                    warn!(%identity_id, error = %e, "Identity email lookup failed");
                    last_failure = Some(e.to_string());
                }
            }

            if self.options.legacy_scan_enabled {
                match self.scan_for_identity(&identity_id).await {
                    Ok(Some(customer)) => {
                        warn!(
                            %identity_id,
                            customer_id = %customer.id,
                            "Customer resolved by legacy scan, identity link needs backfill"
                        );
                        return Ok(found(customer, ResolutionStep::LegacyScan));
                    }
                    Ok(None) => debug!(%identity_id, "Legacy scan found no customer"),
                    Err(e) => {
                        warn!(%identity_id, error = %e, "Legacy customer scan failed");
                        last_failure = Some(e.to_string());
                    }
                }
            } else {
                debug!(%identity_id, "Legacy scan disabled");
            }
        }

        Err(last_failure.map_or(
            ResolveError::IdentityResolutionFailed,
            ResolveError::UpstreamLookup,
        ))
    }

    async fn by_identity_email(
        &self,
        identity_id: &AuthIdentityId,
    ) -> Result<Option<Customer>, LookupError> {
        let Some(identity) = self
            .bounded(self.identities.retrieve_auth_identity(identity_id))
            .await?
        else {
            return Ok(None);
        };
        let Some(email) = identity.email() else {
            return Ok(None);
        };

        let customers = self
            .bounded(self.customers.list_customers(&CustomerFilter::by_email(email)))
            .await?;
        Ok(customers.into_iter().next())
    }

    async fn scan_for_identity(
        &self,
        identity_id: &AuthIdentityId,
    ) -> Result<Option<Customer>, LookupError> {
        let page_size = self.options.scan_page_size.max(1);
        let deadline = Instant::now() + self.options.lookup_timeout;
        let mut offset = 0;

        loop {
            let page = self
                .bounded_until(deadline, self.customers.scan_customers(offset, page_size))
                .await?;

            if let Some(customer) = page
                .customers
                .into_iter()
                .find(|c| c.auth_identity_id().as_ref() == Some(identity_id))
            {
                return Ok(Some(customer));
            }
            if page.rows_read < page_size {
                return Ok(None);
            }
            offset += page.rows_read;
        }
    }

    async fn bounded<T>(
        &self,
        lookup: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, LookupError> {
        self.bounded_until(Instant::now() + self.options.lookup_timeout, lookup)
            .await
    }

    async fn bounded_until<T>(
        &self,
        deadline: Instant,
        lookup: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout_at(deadline, lookup).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LookupError::Timeout(self.options.lookup_timeout)),
        }
    }
}

fn found(customer: Customer, step: ResolutionStep) -> Resolved {
    debug!(customer_id = %customer.id, ?step, "Customer resolved");
    Resolved { customer, step }
}
