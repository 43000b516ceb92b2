//! Cart rehydration.
//!
//! The client owns its cart. Posting a snapshot runs it through the same
//! reducer the storefront uses, so the response carries authoritative
//! totals regardless of what the client sent.

use axum::{Json, extract::rejection::JsonRejection};
use rust_decimal::Decimal;
use serde::Serialize;

use avara_cart::{CartAction, CartItem, CartState};
use avara_core::CustomerId;

use crate::error::Result;
use crate::middleware::OptionalCustomer;
use crate::routes::{ApiResponse, json_body};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total_items: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_savings: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartData {
    pub cart: CartSummary,
    pub customer_id: Option<CustomerId>,
}

/// Rehydrate a cart snapshot and return fresh totals.
pub async fn rehydrate(
    OptionalCustomer(customer): OptionalCustomer,
    payload: std::result::Result<Json<CartState>, JsonRejection>,
) -> Result<ApiResponse<CartData>> {
    let snapshot = json_body(payload, "Invalid cart payload")?;
    let cart = CartState::new().reduce(CartAction::LoadCart(snapshot));

    Ok(ApiResponse::data(CartData {
        cart: CartSummary {
            total_items: cart.total_items(),
            total_price: cart.total_price(),
            total_savings: cart.total_savings(),
            items: cart.items().to_vec(),
        },
        customer_id: customer.map(|c| c.customer_id),
    }))
}
