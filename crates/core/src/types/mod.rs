//! Core types for Avara.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod metadata;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use metadata::{Metadata, metadata_keys};
pub use status::*;
