//! Test harness for the Avara store API.
//!
//! [`TestApp`] drives the real router in-process (`tower::ServiceExt::oneshot`)
//! over in-memory repositories, so the suites under `tests/` need neither a
//! database nor a listening server. Suites that talk to a deployed server
//! are `#[ignore]`d and read `STORE_BASE_URL`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p avara-integration-tests
//!
//! # Against a running server
//! STORE_BASE_URL=http://localhost:9000 cargo test -p avara-integration-tests -- --ignored
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use avara_core::Email;
use avara_store_api::config::{AuthLookupConfig, JwtConfig, StoreConfig};
use avara_store_api::db::{
    AuthIdentityRepository, CustomerRepository, InMemoryAuthIdentityRepository,
    InMemoryCustomerRepository,
};
use avara_store_api::services::{NotifyError, PasswordResetNotifier};
use avara_store_api::{AppState, build_router};

/// Signing secret shared by every in-process app.
pub const TEST_SECRET: &str = "integration-test-secret-with-enough-entropy-9f3Kq";

/// Password that satisfies the registration rules.
pub const TEST_PASSWORD: &str = "Sup3rSecret!";

/// A response reduced to status and JSON body (`Value::Null` when empty or not JSON).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Notifier that keeps reset tokens for the test to read back.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    /// Latest token sent to `email`.
    #[must_use]
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    /// Number of reset messages sent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PasswordResetNotifier for Outbox {
    async fn send_password_reset(&self, email: &Email, token: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.as_str().to_owned(), token.to_owned()));
        Ok(())
    }
}

/// In-process store API.
pub struct TestApp {
    router: Router,
    state: AppState,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub identities: Arc<InMemoryAuthIdentityRepository>,
    pub outbox: Arc<Outbox>,
}

impl TestApp {
    /// App over empty repositories with default lookup options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_repositories(
            InMemoryCustomerRepository::new(),
            InMemoryAuthIdentityRepository::new(),
            AuthLookupConfig::default(),
        )
    }

    /// App over the given repositories and lookup options.
    #[must_use]
    pub fn with_repositories(
        customers: InMemoryCustomerRepository,
        identities: InMemoryAuthIdentityRepository,
        lookup: AuthLookupConfig,
    ) -> Self {
        let customers = Arc::new(customers);
        let identities = Arc::new(identities);

        let mut config = StoreConfig::new(JwtConfig::new(TEST_SECRET, Duration::from_secs(3600)));
        config.auth = lookup;

        let outbox = Arc::new(Outbox::default());
        let state = AppState::with_notifier(
            config,
            customers.clone() as Arc<dyn CustomerRepository>,
            identities.clone() as Arc<dyn AuthIdentityRepository>,
            outbox.clone() as Arc<dyn PasswordResetNotifier>,
        );
        let router = build_router(state.clone(), false);

        Self {
            router,
            state,
            customers,
            identities,
            outbox,
        }
    }

    /// Application state, for issuing tokens directly.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    /// Register a customer and return its token.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let response = self
            .post(
                "/store/auth/register",
                None,
                serde_json::json!({"name": name, "email": email, "password": TEST_PASSWORD}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["data"]["token"].as_str().unwrap().to_owned()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
