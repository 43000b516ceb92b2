//! Registration, login, logout and the current-customer summary.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use avara_core::{CustomerId, Email};

use crate::error::{AppError, FieldError, Result, clear_sentry_user};
use crate::middleware::RequireCustomer;
use crate::models::Customer;
use crate::routes::{ApiResponse, json_body};
use crate::services::{AuthError, AuthSession, PasswordReset, Registration};
use crate::state::AppState;

/// Customer fields returned by the auth endpoints.
#[derive(Debug, Serialize)]
pub struct CustomerSummary {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
}

impl From<&Customer> for CustomerSummary {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.clone(),
            email: customer.email.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionData {
    pub customer: CustomerSummary,
    pub token: String,
}

impl From<AuthSession> for SessionData {
    fn from(session: AuthSession) -> Self {
        Self {
            customer: CustomerSummary::from(&session.customer),
            token: session.token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub customer: CustomerSummary,
}

/// Login form.
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if Email::parse(&self.email).is_err() {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Password is required"));
        }
        errors
    }
}

/// Sent whether or not the account exists.
const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset link has been sent.";

/// Forgot-password form.
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPassword {
    #[serde(default)]
    pub email: String,
}

/// Handle registration.
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Registration>, JsonRejection>,
) -> Result<Response> {
    let registration = json_body(payload, "Validation failed")?;
    let session = state.auth().register(&registration).await?;

    Ok(ApiResponse::data(SessionData::from(session))
        .with_message("Registration successful")
        .with_status(StatusCode::CREATED))
}

/// Handle login.
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Response> {
    let credentials = json_body(payload, "Validation failed")?;

    let errors = credentials.validate();
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors).into());
    }

    let session = state
        .auth()
        .login(&credentials.email, &credentials.password)
        .await?;

    tracing::info!(customer_id = %session.customer.id, "Customer logged in");

    Ok(ApiResponse::data(SessionData::from(session))
        .with_message("Login successful")
        .into_response())
}

/// Handle logout.
///
/// Tokens are stateless; the client discards its copy. Only the
/// `last_logout` stamp is recorded here.
pub async fn logout(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> ApiResponse<()> {
    state.auth().logout(&customer.customer_id).await;
    clear_sentry_user();

    ApiResponse::message("Logout successful")
}

/// Return the authenticated customer's summary.
pub async fn me(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<ApiResponse<MeData>> {
    let customer = state
        .customers()
        .retrieve_customer(&customer.customer_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(ApiResponse::data(MeData {
        customer: CustomerSummary::from(&customer),
    })
    .with_message("Authentication check successful"))
}

/// Start a password reset.
///
/// The response is the same for known and unknown emails.
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ForgotPassword>, JsonRejection>,
) -> Result<ApiResponse<()>> {
    let form = json_body(payload, "Validation failed")?;
    state.auth().request_password_reset(&form.email).await?;

    Ok(ApiResponse::message(RESET_REQUESTED))
}

/// Set a new password with a reset token.
pub async fn reset_password(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PasswordReset>, JsonRejection>,
) -> Result<ApiResponse<()>> {
    let reset = json_body(payload, "Validation failed")?;
    state.auth().reset_password(&reset).await?;

    Ok(ApiResponse::message("Password reset successfully"))
}
