//! Stale data sweeps.
//!
//! # Usage
//!
//! ```bash
//! copperbay-cli cleanup checkouts
//! ```
//!
//! Intended to run on a schedule (cron or similar); the same sweep is
//! reachable over HTTP as `POST /api/checkouts/cleanup`.

use secrecy::SecretString;
use tracing::info;

use copperbay_api::services::CheckoutService;
use copperbay_api::store::{PostgresStore, create_pool};

/// Delete pending checkouts whose expiry has passed.
///
/// # Errors
///
/// Returns an error if `COMMERCE_DATABASE_URL` is unset or the sweep fails.
pub async fn checkouts() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("COMMERCE_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| "COMMERCE_DATABASE_URL not set")?;

    let pool = create_pool(&database_url).await?;
    info!("Connected to database");
    let store = PostgresStore::new(pool);

    let removed = CheckoutService::new(&store).cleanup_expired().await?;

    info!("Removed {removed} expired checkouts");
    Ok(())
}
