//! Domain models for the store API.
//!
//! These are validated domain objects, separate from database row types.

pub mod customer;
pub mod identity;
pub mod order;

pub use customer::{AuthenticatedCustomer, Customer, CustomerFilter, CustomerPatch, NewCustomer};
pub use identity::{AuthIdentity, EMAILPASS_PROVIDER, NewAuthIdentity};
pub use order::{BillingDetails, CreateOrderRequest, Order, OrderItem};
