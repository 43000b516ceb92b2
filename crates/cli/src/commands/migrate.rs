//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! avara-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STORE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! `crates/store-api/migrations/`, embedded at build time.

use thiserror::Error;

use super::{CommandError, connect};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run store API migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running store migrations...");
    sqlx::migrate!("../store-api/migrations").run(&pool).await?;

    tracing::info!("Store migrations complete!");
    Ok(())
}
