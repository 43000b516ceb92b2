//! HTTP middleware for the store API.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry (hub per request, HTTP context)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. Rate limiting on the auth routes (binary only)
//! 5. Customer resolution, per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{
    OptionalCustomer, RequireCustomer, authenticate, extract_bearer_token, optional_authenticate,
    resolve_customer,
};
pub use rate_limit::{ClientIpKeyExtractor, RateLimiterLayer, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
