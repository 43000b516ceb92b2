//! Avara Core - Shared types library.
//!
//! This crate provides common types used across all Avara components:
//! - `store-api` - HTTP service for auth, profile, orders and carts
//! - `cart` - Client-side cart reducer and persistence
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, customer metadata keys and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
