//! Avara store API.
//!
//! Bearer-token authentication for storefront customers, plus the profile,
//! order and cart endpoints that sit behind it.
//!
//! # Architecture
//!
//! - Axum with JSON handlers mounted under `/store`
//! - HS256 tokens issued and verified by [`services::TokenService`]
//! - [`services::CustomerResolver`] maps token claims to a customer record
//! - Repositories behind traits: in-memory or `PostgreSQL` (`store` schema)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use app::build_router;
pub use config::StoreConfig;
pub use error::{AppError, Result};
pub use state::AppState;
