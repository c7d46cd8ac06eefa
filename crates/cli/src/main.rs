//! Copperbay CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! copperbay-cli migrate
//!
//! # Seed the store from a YAML fixture file
//! copperbay-cli seed --file fixtures/seed.yaml
//!
//! # Delete expired pending checkouts
//! copperbay-cli cleanup checkouts
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Load catalog and account fixtures into the store
//! - `cleanup checkouts` - Sweep expired pending checkouts
//!
//! All commands connect through `COMMERCE_DATABASE_URL` and therefore only
//! work against the postgres backend; seeding the in-memory store would not
//! outlive the process.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "copperbay-cli")]
#[command(author, version, about = "Copperbay CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the store from a YAML fixture file
    Seed {
        /// Path to the fixture file
        #[arg(short, long, default_value = "fixtures/seed.yaml")]
        file: String,
    },
    /// Remove stale data
    Cleanup {
        #[command(subcommand)]
        target: CleanupTarget,
    },
}

#[derive(Subcommand)]
enum CleanupTarget {
    /// Delete pending checkouts whose expiry has passed
    Checkouts,
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
        Commands::Seed { file } => commands::seed::from_file(&file).await?,
        Commands::Cleanup { target } => match target {
            CleanupTarget::Checkouts => commands::cleanup::checkouts().await?,
        },
    }
    Ok(())
}
