//! CLI command implementations.

pub mod backfill;
pub mod migrate;
pub mod token;

use thiserror::Error;

/// Errors shared by commands that touch the database.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Neither `STORE_DATABASE_URL` nor `DATABASE_URL` is set.
    #[error("Missing environment variable: STORE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the store database configured in the environment.
///
/// # Errors
///
/// Returns `CommandError` if no URL is configured or the connection fails.
pub async fn connect() -> Result<sqlx::PgPool, CommandError> {
    let url = avara_store_api::config::database_url_from_env()
        .ok_or(CommandError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to store database...");
    Ok(avara_store_api::db::create_pool(&url).await?)
}
