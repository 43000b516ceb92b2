//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StoreConfig;
use crate::db::{
    AuthIdentityRepository, CustomerRepository, InMemoryAuthIdentityRepository,
    InMemoryCustomerRepository, PgAuthIdentityRepository, PgCustomerRepository,
};
use crate::services::{
    AuthService, CustomerResolver, LogNotifier, PasswordResetNotifier, TokenService,
};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Services are injected here rather than
/// looked up from globals, so tests can build a state around any
/// repository implementation.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StoreConfig,
    customers: Arc<dyn CustomerRepository>,
    identities: Arc<dyn AuthIdentityRepository>,
    tokens: TokenService,
    resolver: CustomerResolver,
    notifier: Arc<dyn PasswordResetNotifier>,
}

impl AppState {
    /// Create application state around the given repositories.
    ///
    /// Password reset requests are only logged; see [`Self::with_notifier`].
    #[must_use]
    pub fn new(
        config: StoreConfig,
        customers: Arc<dyn CustomerRepository>,
        identities: Arc<dyn AuthIdentityRepository>,
    ) -> Self {
        Self::with_notifier(config, customers, identities, Arc::new(LogNotifier))
    }

    /// Create application state that delivers reset tokens through `notifier`.
    #[must_use]
    pub fn with_notifier(
        config: StoreConfig,
        customers: Arc<dyn CustomerRepository>,
        identities: Arc<dyn AuthIdentityRepository>,
        notifier: Arc<dyn PasswordResetNotifier>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt.secret, config.jwt.expires_in);
        let resolver = CustomerResolver::new(customers.clone(), identities.clone(), config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                customers,
                identities,
                tokens,
                resolver,
                notifier,
            }),
        }
    }

    /// State backed by empty in-memory repositories.
    #[must_use]
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryCustomerRepository::new()),
            Arc::new(InMemoryAuthIdentityRepository::new()),
        )
    }

    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(config: StoreConfig, pool: PgPool) -> Self {
        Self::new(
            config,
            Arc::new(PgCustomerRepository::new(pool.clone())),
            Arc::new(PgAuthIdentityRepository::new(pool)),
        )
    }

    /// Get a reference to the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Customer repository.
    #[must_use]
    pub fn customers(&self) -> &dyn CustomerRepository {
        self.inner.customers.as_ref()
    }

    /// Auth identity repository.
    #[must_use]
    pub fn identities(&self) -> &dyn AuthIdentityRepository {
        self.inner.identities.as_ref()
    }

    /// Token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Customer resolver used by the auth middleware.
    #[must_use]
    pub fn resolver(&self) -> &CustomerResolver {
        &self.inner.resolver
    }

    /// Authentication service borrowing this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.customers(), self.identities(), self.tokens())
            .with_notifier(self.inner.notifier.as_ref())
    }
}
