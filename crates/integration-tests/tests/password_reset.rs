//! Forgot-password and reset-password over HTTP.

use axum::http::StatusCode;
use serde_json::json;

use avara_integration_tests::{TEST_PASSWORD, TEST_SECRET, TestApp};
use avara_store_api::db::AuthIdentityRepository;
use avara_store_api::models::EMAILPASS_PROVIDER;

const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset link has been sent.";
const INVALID_RESET: &str = "Invalid or expired reset token. Please request a new password reset.";

#[tokio::test]
async fn test_forgot_password_response_does_not_reveal_accounts() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;

    let known = app
        .post("/store/auth/forgot-password", None, json!({"email": "ada@example.com"}))
        .await;
    let unknown = app
        .post("/store/auth/forgot-password", None, json!({"email": "ghost@example.com"}))
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(known.body, unknown.body);
    assert_eq!(known.body["message"], RESET_REQUESTED);

    assert_eq!(app.outbox.len(), 1);
    assert!(app.outbox.token_for("ada@example.com").is_some());
}

#[tokio::test]
async fn test_forgot_password_rejects_malformed_email() {
    let app = TestApp::new();

    let response = app
        .post("/store/auth/forgot-password", None, json!({"email": "nope"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_forgot_password_accepts_bad_bearer_token() {
    let app = TestApp::new();

    let response = app
        .post(
            "/store/auth/forgot-password",
            Some("forged.token.value"),
            json!({"email": "ada@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_then_login_with_new_password() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;
    app.post("/store/auth/forgot-password", None, json!({"email": "ada@example.com"}))
        .await;
    let token = app.outbox.token_for("ada@example.com").unwrap();

    let reset = json!({"email": "ada@example.com", "password": "N3wSecret!", "token": token});
    let response = app.post("/store/auth/reset-password", None, reset.clone()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Password reset successfully");

    let old = app
        .post(
            "/store/auth/login",
            None,
            json!({"email": "ada@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .post(
            "/store/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "N3wSecret!"}),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);

    let reused = app.post("/store/auth/reset-password", None, reset).await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    assert_eq!(reused.body["message"], INVALID_RESET);
}

#[tokio::test]
async fn test_reset_password_rejects_bad_tokens() {
    let app = TestApp::new();
    let bearer = app.register("Ada Lovelace", "ada@example.com").await;

    for token in ["not-a-token", bearer.as_str()] {
        let response = app
            .post(
                "/store/auth/reset-password",
                None,
                json!({"email": "ada@example.com", "password": "N3wSecret!", "token": token}),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["success"], false);
        assert_eq!(response.body["message"], INVALID_RESET);
    }
}

#[tokio::test]
async fn test_reset_password_rejects_expired_token() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;
    let identity = app
        .identities
        .find_by_entity_id(EMAILPASS_PROVIDER, "ada@example.com")
        .await
        .unwrap()
        .unwrap();

    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "ver": 1,
        "purpose": "password_reset",
        "auth_identity_id": identity.id.as_str(),
        "email": "ada@example.com",
        "fpr": "",
        "iat": now - 3600,
        "exp": now - 60,
    });
    let secret = format!("{TEST_SECRET}/password-reset");
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    let response = app
        .post(
            "/store/auth/reset-password",
            None,
            json!({"email": "ada@example.com", "password": "N3wSecret!", "token": expired}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], INVALID_RESET);
}

#[tokio::test]
async fn test_reset_password_validates_fields() {
    let app = TestApp::new();

    let response = app
        .post(
            "/store/auth/reset-password",
            None,
            json!({"email": "nope", "password": "short", "token": ""}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let fields: Vec<&str> = response.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"token"));
}
