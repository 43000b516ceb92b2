//! Avara CLI - store database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run store API migrations
//! avara-cli migrate
//!
//! # Issue a token for an existing customer
//! avara-cli token issue --customer-id cus_01H... --email ada@example.com
//!
//! # Inspect a token
//! avara-cli token verify eyJhbGciOi...
//!
//! # Link identities to legacy customers (preview first)
//! avara-cli backfill-identity-links --dry-run
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "avara-cli")]
#[command(author, version, about = "Avara store API tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run store API database migrations
    Migrate,
    /// Issue or inspect bearer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Record email and customer id on identities referenced by customers
    BackfillIdentityLinks {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Customers fetched per page
        #[arg(long, default_value_t = 100)]
        page_size: usize,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print a signed token
    Issue {
        /// Customer id to embed
        #[arg(short, long)]
        customer_id: String,

        /// Customer email to embed
        #[arg(short, long)]
        email: String,

        /// Auth identity id to embed
        #[arg(short, long)]
        identity: Option<String>,
    },
    /// Print the claims of a token, or why it was rejected
    Verify {
        /// Token to check
        token: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Token { action } => match action {
            TokenAction::Issue {
                customer_id,
                email,
                identity,
            } => commands::token::issue(&customer_id, &email, identity.as_deref())?,
            TokenAction::Verify { token } => commands::token::verify(&token)?,
        },
        Commands::BackfillIdentityLinks { dry_run, page_size } => {
            commands::backfill::run(page_size, dry_run).await?;
        }
    }
    Ok(())
}
