//! Seed the store with catalog and account fixtures.
//!
//! Reads a YAML file of product and user drafts and creates them through the
//! same service layer the API uses, so fixtures pass identical validation.
//! Documents that already exist (matching sku or email) are skipped, which
//! makes the command safe to re-run.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, info};

use copperbay_api::error::AppError;
use copperbay_api::services::products::ProductDraft;
use copperbay_api::services::users::UserDraft;
use copperbay_api::services::{ProductService, UserService};
use copperbay_api::store::{PostgresStore, create_pool};

/// Fixture file layout. Both sections are optional.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    products: Vec<ProductDraft>,
    #[serde(default)]
    users: Vec<UserDraft>,
}

#[derive(Debug, Default)]
struct SeedReport {
    inserted: usize,
    skipped: usize,
    errors: Vec<(String, AppError)>,
}

/// Seed documents from a YAML fixture file.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the file cannot be
/// read or parsed, or any fixture fails for a reason other than already
/// existing.
pub async fn from_file(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let database_url = std::env::var("COMMERCE_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| "COMMERCE_DATABASE_URL not set")?;

    // Verify file exists
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading fixtures from file");

    // Read and validate YAML before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let fixtures: SeedFile = serde_yaml::from_str(&content)?;

    info!(
        products = fixtures.products.len(),
        users = fixtures.users.len(),
        "Parsed fixtures"
    );

    // Connect to database
    let pool = create_pool(&database_url).await?;
    info!("Connected to database");
    let store = PostgresStore::new(pool);

    let mut report = SeedReport::default();

    let products = ProductService::new(&store);
    for draft in fixtures.products {
        let label = format!("product {}", draft.sku);
        match products.create(draft).await {
            Ok(_) => report.inserted += 1,
            Err(AppError::Conflict(_)) => report.skipped += 1,
            Err(e) => report.errors.push((label, e)),
        }
    }

    let users = UserService::new(&store);
    for draft in fixtures.users {
        let label = format!("user {}", draft.email);
        match users.create(draft).await {
            Ok(_) => report.inserted += 1,
            Err(AppError::Conflict(_)) => report.skipped += 1,
            Err(e) => report.errors.push((label, e)),
        }
    }

    // Print summary
    info!("Seeding complete!");
    info!("  Documents inserted: {}", report.inserted);
    info!("  Documents skipped (already exist): {}", report.skipped);

    if !report.errors.is_empty() {
        error!("  Errors: {}", report.errors.len());
        for (label, err) in &report.errors {
            error!("    - {label}: {err}");
        }
        return Err(format!("{} fixtures failed", report.errors.len()).into());
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_fixture_parses() {
        let fixtures: SeedFile =
            serde_yaml::from_str(include_str!("../../fixtures/seed.yaml")).unwrap();
        assert!(!fixtures.products.is_empty());
        assert!(!fixtures.users.is_empty());
    }

    #[test]
    fn test_sections_are_optional() {
        let fixtures: SeedFile = serde_yaml::from_str("products: []").unwrap();
        assert!(fixtures.products.is_empty());
        assert!(fixtures.users.is_empty());
    }
}
