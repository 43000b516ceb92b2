//! Free-form metadata carried by customer and identity records.
//!
//! The commerce data service stores metadata as a JSON object. This module
//! names the keys Avara reads and writes and provides small typed accessors
//! so callers do not poke at `serde_json::Value` directly.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// A JSON object of metadata entries.
pub type Metadata = Map<String, Value>;

/// Well-known metadata keys.
pub mod metadata_keys {
    /// Back-reference from a customer to the auth identity that owns it.
    pub const AUTH_IDENTITY_ID: &str = "auth_identity_id";

    /// Customer id recorded on an auth identity's app metadata.
    pub const CUSTOMER_ID: &str = "customer_id";

    /// Email recorded on an auth identity's app metadata.
    pub const EMAIL: &str = "email";

    /// RFC 3339 timestamp of the last successful login.
    pub const LAST_LOGIN: &str = "last_login";

    /// RFC 3339 timestamp of the last logout.
    pub const LAST_LOGOUT: &str = "last_logout";

    /// Array of order records placed by the customer.
    pub const ORDERS: &str = "orders";

    /// Id of the most recent order.
    pub const LAST_ORDER_ID: &str = "last_order_id";

    /// Timestamp of the most recent order.
    pub const LAST_ORDER_AT: &str = "last_order_at";

    /// Email the most recent order was placed under.
    pub const LAST_ORDER_EMAIL: &str = "last_order_email";
}

/// Read a non-empty string entry.
#[must_use]
pub fn get_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Write a timestamp entry in RFC 3339 with millisecond precision.
pub fn stamp(metadata: &mut Metadata, key: &str, at: DateTime<Utc>) {
    metadata.insert(
        key.to_owned(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
}
