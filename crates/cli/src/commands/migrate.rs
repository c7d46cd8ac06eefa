//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! copperbay-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the document store migrations.
///
/// # Errors
///
/// Returns an error if `COMMERCE_DATABASE_URL` is unset or the database
/// rejects the connection or a migration.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("COMMERCE_DATABASE_URL")
        .map_err(|_| MigrationError::MissingEnvVar("COMMERCE_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
