//! Cart rehydration with optional authentication.

use axum::http::StatusCode;
use serde_json::{Value, json};

use avara_integration_tests::TestApp;

fn snapshot() -> Value {
    json!({
        "items": [
            {"id": "p1", "name": "Argan Oil", "price": 12.5, "originalPrice": 15.0, "quantity": 2},
            {"id": "p2", "name": "Rose Water", "price": 5.0, "quantity": 0},
            {"id": "p1", "name": "Argan Oil", "price": 12.5, "originalPrice": 15.0, "quantity": 1}
        ],
        "totalItems": 99,
        "totalPrice": 1000.0
    })
}

#[tokio::test]
async fn test_anonymous_cart_gets_fresh_totals() {
    let app = TestApp::new();

    let response = app.post("/store/carts", None, snapshot()).await;
    assert_eq!(response.status, StatusCode::OK);

    let data = &response.body["data"];
    assert_eq!(data["customer_id"], Value::Null);
    assert_eq!(data["cart"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["cart"]["totalItems"], 3);
    assert_eq!(data["cart"]["totalPrice"], 37.5);
    assert_eq!(data["cart"]["totalSavings"], 7.5);
}

#[tokio::test]
async fn test_cart_attaches_customer_when_token_resolves() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let me = app.get("/store/auth/me", Some(&token)).await;
    let response = app.post("/store/carts", Some(&token), snapshot()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["customer_id"], me.body["data"]["customer"]["id"]);
}

#[tokio::test]
async fn test_cart_with_bad_token_continues_anonymously() {
    let app = TestApp::new();

    let response = app.post("/store/carts", Some("forged.token.value"), snapshot()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["customer_id"], Value::Null);
}

#[tokio::test]
async fn test_out_of_range_cart_is_rejected() {
    let app = TestApp::new();
    let payload = json!({
        "items": [{"id": "A", "name": "A", "price": 1e20, "quantity": 4_000_000_000_u64}]
    });

    let response = app.post("/store/carts", None, payload).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["message"], "Invalid cart payload");
    assert_eq!(response.body["errors"][0]["field"], "body");

    let healthy = app.post("/store/carts", None, snapshot()).await;
    assert_eq!(healthy.status, StatusCode::OK);
}
