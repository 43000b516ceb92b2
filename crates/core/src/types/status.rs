//! Status enums for orders.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Created,
    Processing,
    Completed,
    Cancelled,
}

/// How the customer intends to pay for an order.
///
/// Payment itself is settled outside Avara; this is only recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Card => write!(f, "card"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap_or_default();
        assert_eq!(json, "\"cancelled\"");
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("card".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
        assert!("cheque".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::Cash.to_string(), "cash");
    }
}
