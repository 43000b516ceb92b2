//! Order records kept in customer metadata.
//!
//! Orders are appended to the `orders` array of the customer's metadata.
//! Client-supplied totals are checked against the line items and replaced
//! when they disagree by more than a cent.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use avara_core::{Email, Metadata, OrderStatus, PaymentMethod, metadata_keys};

use crate::error::FieldError;

/// Largest unit price or order amount accepted from a client.
pub const MAX_ORDER_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest quantity accepted on a single order line.
pub const MAX_ORDER_QUANTITY: i64 = 10_000;

const AMOUNT_TOO_LARGE: &str = "Must be at most 1000000000";

/// A line on a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Billing contact captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub post_code: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// `ORD-<base36 millis>-<6 random base36>`
    pub id: String,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub billing_details: BillingDetails,
    pub created_at: DateTime<Utc>,
}

/// Line as posted by the client; quantity is signed so a negative value
/// surfaces as a field error rather than a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i64,
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of `POST /store/customer/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

impl CreateOrderRequest {
    /// Check the payload, returning one entry per violated field.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "At least one item is required"));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.id.trim().is_empty() {
                errors.push(FieldError::new(format!("items.{i}.id"), "Required"));
            }
            if item.name.trim().is_empty() {
                errors.push(FieldError::new(format!("items.{i}.name"), "Required"));
            }
            if item.price < Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items.{i}.price"),
                    "Must be greater than or equal to 0",
                ));
            } else if item.price > MAX_ORDER_AMOUNT {
                errors.push(FieldError::new(format!("items.{i}.price"), AMOUNT_TOO_LARGE));
            }
            if item.quantity <= 0 {
                errors.push(FieldError::new(
                    format!("items.{i}.quantity"),
                    "Must be a positive integer",
                ));
            } else if item.quantity > MAX_ORDER_QUANTITY {
                errors.push(FieldError::new(
                    format!("items.{i}.quantity"),
                    "Must be at most 10000",
                ));
            }
        }

        for (field, amount) in [
            ("subtotal", self.subtotal),
            ("shipping", self.shipping),
            ("total", self.total),
        ] {
            if amount < Decimal::ZERO {
                errors.push(FieldError::new(field, "Must be greater than or equal to 0"));
            } else if amount > MAX_ORDER_AMOUNT {
                errors.push(FieldError::new(field, AMOUNT_TOO_LARGE));
            }
        }

        let billing = &self.billing_details;
        for (field, value) in [
            ("firstName", &billing.first_name),
            ("lastName", &billing.last_name),
            ("address", &billing.address),
            ("country", &billing.country),
            ("postCode", &billing.post_code),
        ] {
            if value.trim().is_empty() {
                errors.push(FieldError::new(format!("billing_details.{field}"), "Required"));
            }
        }
        if Email::parse(&billing.email).is_err() {
            errors.push(FieldError::new("billing_details.email", "Invalid email"));
        }

        errors
    }

    /// Turn a validated request into an order.
    ///
    /// Subtotal and total are recomputed from the lines; if either client
    /// figure differs from the computed one at cent precision, both are
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns a `total` field error if the amounts cannot be represented,
    /// which only happens for requests that skipped [`Self::validate`].
    pub fn into_order(self, id: String, now: DateTime<Utc>) -> Result<Order, FieldError> {
        let out_of_range = || FieldError::new("total", "Out of range");

        let items: Vec<OrderItem> = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: item.id,
                name: item.name,
                price: item.price,
                quantity: u32::try_from(item.quantity).unwrap_or(0),
                image: item.image.filter(|image| !image.is_empty()),
            })
            .collect();

        let computed_subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| {
                item.price
                    .checked_mul(Decimal::from(item.quantity))
                    .and_then(|line| sum.checked_add(line))
            })
            .ok_or_else(out_of_range)?;
        let computed_total = computed_subtotal
            .checked_add(self.shipping)
            .ok_or_else(out_of_range)?;

        let cents_of = |amount: Decimal| cents(amount).ok_or_else(out_of_range);
        let mismatch = cents_of(computed_subtotal)? != cents_of(self.subtotal)?
            || cents_of(computed_total)? != cents_of(self.total)?;
        let (subtotal, total) = if mismatch {
            tracing::info!(
                client_subtotal = %self.subtotal,
                client_total = %self.total,
                %computed_subtotal,
                %computed_total,
                "Order totals did not match line items, using computed totals"
            );
            (computed_subtotal.round_dp(2), computed_total.round_dp(2))
        } else {
            (self.subtotal, self.total)
        };

        Ok(Order {
            id,
            items,
            subtotal,
            shipping: self.shipping,
            total,
            payment_method: self.payment_method,
            status: OrderStatus::Created,
            billing_details: self.billing_details,
            created_at: now,
        })
    }
}

fn cents(amount: Decimal) -> Option<Decimal> {
    amount.checked_mul(Decimal::ONE_HUNDRED).map(|c| c.round())
}

/// Mint an order id from the current time and six random base36 digits.
#[must_use]
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let mut rng = rand::rng();
    let random: String = (0..6)
        .map(|_| base36_digit(rng.random_range(0..36)))
        .collect();
    format!("ORD-{}-{random}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        #[allow(clippy::cast_possible_truncation)] // remainder is always < 36
        digits.push(base36_digit((value % 36) as u8));
        value /= 36;
    }
    digits.iter().rev().collect()
}

fn base36_digit(value: u8) -> char {
    char::from_digit(u32::from(value), 36)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

/// Orders stored in `metadata.orders`, newest first.
///
/// Entries that no longer parse are skipped with a warning.
#[must_use]
pub fn orders_from_metadata(metadata: &Metadata) -> Vec<Order> {
    let Some(entries) = metadata
        .get(metadata_keys::ORDERS)
        .and_then(serde_json::Value::as_array)
    else {
        return Vec::new();
    };

    let mut orders: Vec<Order> = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Order>(entry.clone()) {
            Ok(order) => Some(order),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable order record");
                None
            }
        })
        .collect();

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// Metadata patch that appends `order` and records it as the latest.
///
/// `existing` is the customer's current metadata; the full `orders` array is
/// rewritten since metadata merges replace whole values.
///
/// # Errors
///
/// Returns `serde_json::Error` if the order cannot be serialized.
pub fn append_order_patch(
    existing: &Metadata,
    order: &Order,
    email: &Email,
) -> Result<Metadata, serde_json::Error> {
    let mut orders = existing
        .get(metadata_keys::ORDERS)
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();
    orders.push(serde_json::to_value(order)?);

    let mut patch = Metadata::new();
    patch.insert(metadata_keys::ORDERS.to_owned(), orders.into());
    patch.insert(
        metadata_keys::LAST_ORDER_ID.to_owned(),
        order.id.clone().into(),
    );
    avara_core::types::metadata::stamp(&mut patch, metadata_keys::LAST_ORDER_AT, order.created_at);
    patch.insert(
        metadata_keys::LAST_ORDER_EMAIL.to_owned(),
        email.as_str().into(),
    );
    Ok(patch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn request(body: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "items": [
                {"id": "prod_1", "name": "Mango Nectar", "price": 4.5, "quantity": 2},
                {"id": "prod_2", "name": "Guava Juice", "price": 3.25, "quantity": 1, "image": "/g.png"}
            ],
            "subtotal": 12.25,
            "shipping": 5,
            "total": 17.25,
            "payment_method": "card",
            "billing_details": {
                "firstName": "Jane", "lastName": "Doe", "email": "jane@avara.shop",
                "address": "1 Main St", "country": "NG", "postCode": "100001"
            }
        })
    }

    #[test]
    fn test_valid_request_keeps_matching_totals() {
        let req = request(valid_body());
        assert!(req.validate().is_empty());

        let order = req.into_order("ORD-1".into(), Utc::now()).unwrap();
        assert_eq!(order.subtotal, Decimal::new(1225, 2));
        assert_eq!(order.total, Decimal::new(1725, 2));
        assert_eq!(order.payment_method, PaymentMethod::Card);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.items[1].image.as_deref(), Some("/g.png"));
    }

    #[test]
    fn test_mismatched_totals_are_recomputed() {
        let mut body = valid_body();
        body["subtotal"] = json!(1.0);
        body["total"] = json!(1.0);
        let order = request(body).into_order("ORD-1".into(), Utc::now()).unwrap();

        assert_eq!(order.subtotal, Decimal::new(1225, 2));
        assert_eq!(order.total, Decimal::new(1725, 2));
    }

    #[test]
    fn test_sub_cent_difference_is_tolerated() {
        let mut body = valid_body();
        body["total"] = json!(17.251);
        let order = request(body).into_order("ORD-1".into(), Utc::now()).unwrap();
        assert_eq!(order.total, Decimal::new(17251, 3));
    }

    #[test]
    fn test_validate_reports_each_field() {
        let req = request(json!({
            "items": [{"id": "", "name": "X", "price": -1, "quantity": 0}],
            "subtotal": 0,
            "total": -2,
            "billing_details": {"firstName": "Jane", "email": "nope"}
        }));
        let fields: Vec<String> = req.validate().into_iter().map(|e| e.field).collect();

        assert!(fields.contains(&"items.0.id".to_string()));
        assert!(fields.contains(&"items.0.price".to_string()));
        assert!(fields.contains(&"items.0.quantity".to_string()));
        assert!(fields.contains(&"total".to_string()));
        assert!(fields.contains(&"billing_details.lastName".to_string()));
        assert!(fields.contains(&"billing_details.email".to_string()));
        assert!(!fields.contains(&"billing_details.firstName".to_string()));
    }

    #[test]
    fn test_validate_rejects_oversized_amounts() {
        let mut body = valid_body();
        body["subtotal"] = json!(1.0e27);
        body["items"][0]["price"] = json!(1.0e20);
        body["items"][1]["quantity"] = json!(4_000_000_000_u64);
        let fields: Vec<String> = request(body).validate().into_iter().map(|e| e.field).collect();

        assert!(fields.contains(&"subtotal".to_string()));
        assert!(fields.contains(&"items.0.price".to_string()));
        assert!(fields.contains(&"items.1.quantity".to_string()));
    }

    #[test]
    fn test_into_order_overflow_is_an_error() {
        let mut body = valid_body();
        body["subtotal"] = json!(1.0e27);
        let err = request(body)
            .into_order("ORD-1".into(), Utc::now())
            .unwrap_err();
        assert_eq!(err.field, "total");

        let mut body = valid_body();
        body["items"][0]["price"] = json!(7.0e28);
        body["items"][0]["quantity"] = json!(2);
        assert!(request(body).into_order("ORD-1".into(), Utc::now()).is_err());
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut body = valid_body();
        body["items"] = json!([]);
        let errors = request(body).validate();
        assert_eq!(errors[0].field, "items");
    }

    #[test]
    fn test_generate_order_id_shape() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let id = generate_order_id(now);
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], to_base36(u64::try_from(now.timestamp_millis()).unwrap()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_orders_from_metadata_newest_first_and_skips_garbage() {
        let older = request(valid_body())
            .into_order("ORD-A".into(), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        let newer = request(valid_body())
            .into_order("ORD-B".into(), Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap())
            .unwrap();

        let mut metadata = Metadata::new();
        metadata.insert(
            "orders".into(),
            json!([serde_json::to_value(&older).unwrap(), {"bogus": true}, serde_json::to_value(&newer).unwrap()]),
        );

        let ids: Vec<String> = orders_from_metadata(&metadata).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, ["ORD-B", "ORD-A"]);
        assert!(orders_from_metadata(&Metadata::new()).is_empty());
    }

    #[test]
    fn test_append_order_patch_sets_last_order_fields() {
        let order = request(valid_body())
            .into_order(
                "ORD-NEW".into(),
                Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            )
            .unwrap();
        let mut existing = Metadata::new();
        existing.insert("orders".into(), json!([{"id": "ORD-OLD"}]));
        let email = Email::parse("jane@avara.shop").unwrap();

        let patch = append_order_patch(&existing, &order, &email).unwrap();

        assert_eq!(patch["orders"].as_array().unwrap().len(), 2);
        assert_eq!(patch["last_order_id"], json!("ORD-NEW"));
        assert_eq!(patch["last_order_at"], json!("2026-03-04T05:06:07.000Z"));
        assert_eq!(patch["last_order_email"], json!("jane@avara.shop"));
    }
}
