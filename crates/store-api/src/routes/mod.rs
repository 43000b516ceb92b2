//! HTTP route handlers for the store API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//!
//! # Auth
//! POST /store/auth/register     - Create identity + customer, returns token
//! POST /store/auth/login        - Password login, returns token
//! POST /store/auth/forgot-password - Send a reset token if the account exists (optional auth)
//! POST /store/auth/reset-password  - Set a new password with a reset token
//! POST /store/auth/logout       - Stamp last_logout (requires auth)
//! GET  /store/auth/me           - Current customer summary (requires auth)
//!
//! # Profile (requires auth)
//! GET  /store/customers/me      - Full profile
//! PUT  /store/customers/me      - Update name/email
//!
//! # Orders (requires auth)
//! GET  /store/customer/orders   - Orders stored on the customer, newest first
//! POST /store/customer/orders   - Record an order
//!
//! # Carts (optional auth)
//! POST /store/carts             - Rehydrate a cart snapshot with fresh totals
//! ```

pub mod auth;
pub mod carts;
pub mod customers;
pub mod orders;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::error::{AppError, FieldError};
use crate::middleware::{auth_rate_limiter, authenticate, optional_authenticate};
use crate::state::AppState;

/// Success envelope: `{success: true, message?, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope carrying data.
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Respond with the given status.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl ApiResponse<()> {
    /// Envelope carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        self.with_status(StatusCode::OK)
    }
}

/// Unwrap a JSON body, turning a rejection into a 400 with the parser's reason.
///
/// # Errors
///
/// Returns `AppError::Validation` when the body is missing or malformed.
pub fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AppError::validation(message, vec![FieldError::new("body", rejection.body_text())])
    })
}

/// Auth routes. Register, login and the password reset pair are open;
/// logout and me require a customer.
pub fn auth_routes(state: &AppState, rate_limit: bool) -> Router<AppState> {
    let forgot = Router::new()
        .route("/forgot-password", post(auth::forgot_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_authenticate,
        ));
    let mut open = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/reset-password", post(auth::reset_password))
        .merge(forgot);
    if rate_limit {
        open = open.layer(auth_rate_limiter());
    }

    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    open.merge(protected)
}

/// Routes that require an authenticated customer.
pub fn customer_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/customers/me", get(customers::show).put(customers::update))
        .route("/customer/orders", get(orders::index).post(orders::create))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

/// Routes where a customer is attached when the token resolves.
pub fn cart_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/carts", post(carts::rehydrate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_authenticate,
        ))
}

/// All routes for the store API.
///
/// `rate_limit` puts the per-client limiter on the unauthenticated auth routes.
pub fn routes(state: &AppState, rate_limit: bool) -> Router<AppState> {
    let store = Router::new()
        .nest("/auth", auth_routes(state, rate_limit))
        .merge(customer_routes(state))
        .merge(cart_routes(state));

    Router::new()
        .route("/health", get(health))
        .nest("/store", store)
}

/// Liveness health check.
async fn health() -> &'static str {
    "ok"
}
