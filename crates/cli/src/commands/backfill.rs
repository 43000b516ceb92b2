//! Identity link backfill command.
//!
//! # Usage
//!
//! ```bash
//! # Preview
//! avara-cli backfill-identity-links --dry-run
//!
//! # Apply
//! avara-cli backfill-identity-links --page-size 500
//! ```
//!
//! After a successful run, `AUTH_LEGACY_SCAN_ENABLED=false` can be set on
//! the server.

use thiserror::Error;

use avara_store_api::db::{PgAuthIdentityRepository, PgCustomerRepository, RepositoryError};
use avara_store_api::services::backfill_identity_links;

use super::{CommandError, connect};

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Backfill failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Run the backfill against the configured database.
///
/// # Errors
///
/// Returns `BackfillError` if the database is unreachable or a write fails.
pub async fn run(page_size: usize, dry_run: bool) -> Result<(), BackfillError> {
    let pool = connect().await?;
    let customers = PgCustomerRepository::new(pool.clone());
    let identities = PgAuthIdentityRepository::new(pool);

    if dry_run {
        tracing::info!("Dry run: no identities will be modified");
    }

    let report = backfill_identity_links(&customers, &identities, page_size, dry_run).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Customers scanned:     {}", report.scanned);
        println!(
            "Identities {}:   {}",
            if dry_run { "to link" } else { "linked " },
            report.linked
        );
        println!("Already linked:        {}", report.already_linked);
        println!("Missing identities:    {}", report.missing_identity);
    }
    Ok(())
}
