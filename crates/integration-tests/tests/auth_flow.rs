//! Register, login, me and logout over HTTP.

use axum::http::StatusCode;
use serde_json::json;

use avara_integration_tests::{TEST_PASSWORD, TestApp};

#[tokio::test]
async fn test_register_login_me_round_trip() {
    let app = TestApp::new();

    let registered = app
        .post(
            "/store/auth/register",
            None,
            json!({"name": "Ada Lovelace", "email": "ada@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["success"], true);
    assert_eq!(registered.body["data"]["customer"]["first_name"], "Ada");
    assert_eq!(registered.body["data"]["customer"]["last_name"], "Lovelace");

    let login = app
        .post(
            "/store/auth/login",
            None,
            json!({"email": "ada@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["message"], "Login successful");
    let token = login.body["data"]["token"].as_str().unwrap().to_owned();

    let me = app.get("/store/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["customer"]["email"], "ada@example.com");
    assert_eq!(
        me.body["data"]["customer"]["id"],
        registered.body["data"]["customer"]["id"]
    );
}

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;

    let again = app
        .post(
            "/store/auth/register",
            None,
            json!({"name": "Ada Again", "email": "ada@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["success"], false);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = TestApp::new();

    let response = app
        .post(
            "/store/auth/register",
            None,
            json!({"name": "A", "email": "nope", "password": "short"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Validation failed");

    let fields: Vec<&str> = response.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;

    let wrong_password = app
        .post(
            "/store/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "Wrong-Passw0rd"}),
        )
        .await;
    let unknown_email = app
        .post(
            "/store/auth/login",
            None,
            json!({"email": "grace@example.com", "password": TEST_PASSWORD}),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
}

#[tokio::test]
async fn test_login_requires_well_formed_credentials() {
    let app = TestApp::new();

    let response = app
        .post("/store/auth/login", None, json!({"email": "ada@example.com"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["field"], "password");
}

#[tokio::test]
async fn test_login_stamps_last_login() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    app.post(
        "/store/auth/login",
        None,
        json!({"email": "ada@example.com", "password": TEST_PASSWORD}),
    )
    .await;

    let profile = app.get("/store/customers/me", Some(&token)).await;
    assert!(profile.body["data"]["customer"]["metadata"]["last_login"].is_string());
}

#[tokio::test]
async fn test_logout_stamps_last_logout() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let logout = app
        .request(axum::http::Method::POST, "/store/auth/logout", Some(&token), None)
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body, json!({"success": true, "message": "Logout successful"}));

    let profile = app.get("/store/customers/me", Some(&token)).await;
    assert!(profile.body["data"]["customer"]["metadata"]["last_logout"].is_string());
}

#[tokio::test]
async fn test_protected_routes_share_one_unauthorized_body() {
    let app = TestApp::new();
    let expected = json!({"success": false, "message": "Unauthorized"});

    let missing = app.get("/store/auth/me", None).await;
    let garbage = app.get("/store/auth/me", Some("not-a-token")).await;
    let orders = app.get("/store/customer/orders", Some("a.b.c")).await;

    for response in [missing, garbage, orders] {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body, expected);
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
}
