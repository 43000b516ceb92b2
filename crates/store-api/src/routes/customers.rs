//! Profile of the authenticated customer.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use avara_core::{CustomerId, Email, Metadata};

use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Customer, CustomerPatch};
use crate::routes::{ApiResponse, json_body};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Profile {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl From<Customer> for Profile {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            email: customer.email,
            first_name: customer.first_name,
            last_name: customer.last_name,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
            metadata: customer.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub customer: Profile,
}

#[derive(Debug, Serialize)]
pub struct UpdatedProfile {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedProfileData {
    pub customer: UpdatedProfile,
}

/// Profile update form. Blank fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl ProfileUpdate {
    fn into_patch(self) -> Result<CustomerPatch> {
        let email = non_blank(self.email)
            .map(|raw| {
                Email::parse(&raw).map_err(|_| {
                    AppError::validation(
                        "Validation failed",
                        vec![FieldError::new("email", "Invalid email address")],
                    )
                })
            })
            .transpose()?;

        Ok(CustomerPatch {
            email,
            first_name: non_blank(self.first_name),
            last_name: non_blank(self.last_name),
            metadata: None,
        })
    }
}

/// Return the full profile.
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<ApiResponse<ProfileData>> {
    let customer = state
        .customers()
        .retrieve_customer(&customer.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    Ok(ApiResponse::data(ProfileData {
        customer: Profile::from(customer),
    }))
}

/// Update name and/or email.
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    payload: std::result::Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<ApiResponse<UpdatedProfileData>> {
    let patch = json_body(payload, "Validation failed")?.into_patch()?;
    if patch.is_empty() {
        return Err(AppError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }

    let updated = state
        .customers()
        .update_customer(&customer.customer_id, patch)
        .await?;

    tracing::info!(customer_id = %updated.id, "Profile updated");

    Ok(ApiResponse::data(UpdatedProfileData {
        customer: UpdatedProfile {
            id: updated.id,
            email: updated.email,
            first_name: updated.first_name,
            last_name: updated.last_name,
            updated_at: updated.updated_at,
        },
    })
    .with_message("Profile updated successfully"))
}
