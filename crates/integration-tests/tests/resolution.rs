//! Token-to-customer resolution through the mandatory middleware.
//!
//! Fixtures are seeded straight into the in-memory repositories so each
//! test can leave exactly one resolution path open.

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::Value;

use avara_core::{AuthIdentityId, CustomerId, Email, Metadata, metadata_keys};
use avara_integration_tests::TestApp;
use avara_store_api::config::AuthLookupConfig;
use avara_store_api::db::{InMemoryAuthIdentityRepository, InMemoryCustomerRepository};
use avara_store_api::models::{AuthIdentity, Customer, EMAILPASS_PROVIDER};
use avara_store_api::services::TokenService;

const EPOCH: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

fn customer(id: &str, email: &str, identity: Option<&str>) -> Customer {
    let mut metadata = Metadata::new();
    if let Some(identity) = identity {
        metadata.insert(metadata_keys::AUTH_IDENTITY_ID.to_owned(), identity.into());
    }
    Customer {
        id: CustomerId::new(id),
        email: Email::parse(email).unwrap(),
        first_name: "Legacy".to_owned(),
        last_name: "Customer".to_owned(),
        metadata,
        created_at: EPOCH,
        updated_at: EPOCH,
    }
}

fn identity(id: &str, email: Option<&str>) -> AuthIdentity {
    let mut app_metadata = Metadata::new();
    if let Some(email) = email {
        app_metadata.insert(metadata_keys::EMAIL.to_owned(), email.into());
    }
    AuthIdentity {
        id: AuthIdentityId::new(id),
        provider: EMAILPASS_PROVIDER.to_owned(),
        entity_id: email.unwrap_or("unknown@example.com").to_owned(),
        password_hash: String::new(),
        app_metadata,
        created_at: EPOCH,
    }
}

fn app(customers: Vec<Customer>, identities: Vec<AuthIdentity>, scan: bool) -> TestApp {
    TestApp::with_repositories(
        InMemoryCustomerRepository::with_customers(customers),
        InMemoryAuthIdentityRepository::with_identities(identities),
        AuthLookupConfig {
            legacy_scan_enabled: scan,
            scan_page_size: 2,
            ..AuthLookupConfig::default()
        },
    )
}

fn identity_token(app: &TestApp, identity: &str, customer: &str) -> String {
    app.state()
        .tokens()
        .issue_for_identity(
            &AuthIdentityId::new(identity),
            &CustomerId::new(customer),
            &Email::parse("token@example.com").unwrap(),
        )
        .unwrap()
}

async fn me_id(app: &TestApp, token: &str) -> (StatusCode, Value) {
    let response = app.get("/store/auth/me", Some(token)).await;
    (response.status, response.body["data"]["customer"]["id"].clone())
}

#[tokio::test]
async fn test_direct_customer_id() {
    let app = app(vec![customer("cus_1", "one@example.com", None)], vec![], false);
    let token = app
        .state()
        .tokens()
        .issue(&CustomerId::new("cus_1"), &Email::parse("one@example.com").unwrap())
        .unwrap();

    let (status, id) = me_id(&app, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id, "cus_1");
}

#[tokio::test]
async fn test_falls_back_to_identity_email() {
    let app = app(
        vec![customer("cus_2", "two@example.com", None)],
        vec![identity("authid_2", Some("two@example.com"))],
        false,
    );
    // Stale customer id in the token; the identity email still matches.
    let token = identity_token(&app, "authid_2", "cus_deleted");

    let (status, id) = me_id(&app, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id, "cus_2");
}

#[tokio::test]
async fn test_legacy_scan_finds_back_reference() {
    let customers = vec![
        customer("cus_a", "a@example.com", None),
        customer("cus_b", "b@example.com", Some("authid_other")),
        customer("cus_c", "c@example.com", None),
        customer("cus_3", "three@example.com", Some("authid_3")),
    ];
    let app = app(customers, vec![identity("authid_3", None)], true);
    let token = identity_token(&app, "authid_3", "");

    let (status, id) = me_id(&app, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id, "cus_3");
}

#[tokio::test]
async fn test_legacy_scan_disabled() {
    let customers = vec![customer("cus_3", "three@example.com", Some("authid_3"))];
    let app = app(customers, vec![identity("authid_3", None)], false);
    let token = identity_token(&app, "authid_3", "");

    let (status, _) = me_id(&app, &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_another_signer_is_rejected() {
    let app = app(vec![customer("cus_1", "one@example.com", None)], vec![], false);
    let foreign = TokenService::new(
        &SecretString::from("some-other-signing-secret-0123456789abcdef"),
        Duration::from_secs(60),
    )
    .issue(&CustomerId::new("cus_1"), &Email::parse("one@example.com").unwrap())
    .unwrap();

    let response = app.get("/store/auth/me", Some(&foreign)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Unauthorized");
}

#[tokio::test]
async fn test_unknown_customer_is_unauthorized() {
    let app = app(vec![], vec![], true);
    let token = app
        .state()
        .tokens()
        .issue(&CustomerId::new("cus_missing"), &Email::parse("x@example.com").unwrap())
        .unwrap();

    let (status, _) = me_id(&app, &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
