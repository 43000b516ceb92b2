//! Orders recorded on the authenticated customer.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use serde::Serialize;

use avara_core::CustomerId;

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::order::{append_order_patch, generate_order_id, orders_from_metadata};
use crate::models::{CreateOrderRequest, CustomerPatch, Order};
use crate::routes::{ApiResponse, json_body};
use crate::state::AppState;

const INVALID_ORDER: &str = "Invalid order payload";

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OrderOwner {
    pub id: CustomerId,
}

#[derive(Debug, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub customer: OrderOwner,
}

/// List orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<ApiResponse<OrderList>> {
    let customer = state
        .customers()
        .retrieve_customer(&customer.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    Ok(ApiResponse::data(OrderList {
        orders: orders_from_metadata(&customer.metadata),
    }))
}

/// Record a new order on the customer.
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(authenticated): RequireCustomer,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload, INVALID_ORDER)?;

    let errors = request.validate();
    if !errors.is_empty() {
        return Err(AppError::validation(INVALID_ORDER, errors));
    }

    let customer = state
        .customers()
        .retrieve_customer(&authenticated.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    let now = Utc::now();
    let order = request
        .into_order(generate_order_id(now), now)
        .map_err(|e| AppError::validation(INVALID_ORDER, vec![e]))?;

    let patch = append_order_patch(&customer.metadata, &order, &authenticated.email)
        .map_err(|e| AppError::Internal(format!("failed to encode order: {e}")))?;
    let updated = state
        .customers()
        .update_customer(&customer.id, CustomerPatch::metadata(patch))
        .await?;

    tracing::info!(
        customer_id = %updated.id,
        order_id = %order.id,
        total = %order.total,
        "Order created"
    );

    Ok(ApiResponse::data(CreatedOrder {
        order,
        customer: OrderOwner { id: updated.id },
    })
    .with_message("Order created successfully")
    .with_status(StatusCode::CREATED))
}
