//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; the defaults boot an in-memory instance on
//! `127.0.0.1:3000`.
//!
//! - `COMMERCE_HOST` - Bind address (default: 127.0.0.1)
//! - `COMMERCE_PORT` - Listen port (default: 3000)
//! - `COMMERCE_APP_ENV` - `development` or `production` (default: development).
//!   Production responses omit internal error detail.
//! - `COMMERCE_STORE_BACKEND` - `memory` or `postgres` (default: memory)
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string; required when
//!   the backend is `postgres`, with fallback to generic `DATABASE_URL`
//! - `COMMERCE_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `COMMERCE_RATE_LIMIT_PER_SECOND` - Seconds per replenished token (default: 1)
//! - `COMMERCE_RATE_LIMIT_BURST` - Burst size per client IP (default: 50)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 1.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment environment.
///
/// Production mode keeps internal error detail (SQL errors, decode failures)
/// out of HTTP responses; development mode includes it to ease debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    /// Whether the API is running in production mode.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "expected 'development' or 'production', got '{other}'"
            )),
        }
    }
}

/// Which `ResourceStore` implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process store, data lost on restart. Suitable for tests and demos.
    #[default]
    Memory,
    /// `PostgreSQL` JSONB document table.
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("expected 'memory' or 'postgres', got '{other}'")),
        }
    }
}

/// Per-IP rate limiting thresholds.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Seconds to replenish one token.
    pub per_second: u64,
    /// Burst size allowed before throttling kicks in.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // ~60 sustained requests per minute with a burst of 50
        Self {
            per_second: 1,
            burst: 50,
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment (gates error detail exposure)
    pub app_env: AppEnv,
    /// Store backend selection
    pub store_backend: StoreBackend,
    /// `PostgreSQL` connection URL (contains password). `None` only when the
    /// memory backend is selected and no URL is configured.
    pub database_url: Option<SecretString>,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Rate limiting thresholds
    pub rate_limit: RateLimitConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 - 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry trace sample rate (0.0 - 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable fails to parse, or if the
    /// `postgres` backend is selected without a database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("COMMERCE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("COMMERCE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("COMMERCE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("COMMERCE_PORT".to_string(), e.to_string()))?;
        let app_env = get_env_or_default("COMMERCE_APP_ENV", "development")
            .parse::<AppEnv>()
            .map_err(|e| ConfigError::InvalidEnvVar("COMMERCE_APP_ENV".to_string(), e))?;
        let store_backend = get_env_or_default("COMMERCE_STORE_BACKEND", "memory")
            .parse::<StoreBackend>()
            .map_err(|e| ConfigError::InvalidEnvVar("COMMERCE_STORE_BACKEND".to_string(), e))?;

        // The URL is only mandatory for the postgres backend, but when present
        // it is kept around so the CLI can share the same configuration.
        let database_url = match get_database_url("COMMERCE_DATABASE_URL") {
            Ok(url) => Some(url),
            Err(_) if store_backend == StoreBackend::Memory => None,
            Err(e) => return Err(e),
        };

        let cors_origins = get_optional_env("COMMERCE_CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        let rate_limit = RateLimitConfig {
            per_second: get_env_or_default("COMMERCE_RATE_LIMIT_PER_SECOND", "1")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "COMMERCE_RATE_LIMIT_PER_SECOND".to_string(),
                        e.to_string(),
                    )
                })?,
            burst: get_env_or_default("COMMERCE_RATE_LIMIT_BURST", "50")
                .parse::<u32>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "COMMERCE_RATE_LIMIT_BURST".to_string(),
                        e.to_string(),
                    )
                })?,
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            app_env,
            store_backend,
            database_url,
            cors_origins,
            rate_limit,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL` (used by hosted
/// postgres attach flows).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Split a comma-separated origin list, trimming whitespace and dropping
/// empty entries.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert_eq!("development".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert_eq!("dev".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert_eq!("production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("PROD".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn test_app_env_is_production() {
        assert!(AppEnv::Production.is_production());
        assert!(!AppEnv::Development.is_production());
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!(
            "memory".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert_eq!(
            "Postgres".parse::<StoreBackend>().unwrap(),
            StoreBackend::Postgres
        );
        assert_eq!(
            "postgresql".parse::<StoreBackend>().unwrap(),
            StoreBackend::Postgres
        );
        assert!("mongodb".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_origins_splits_and_trims() {
        let origins = parse_origins("https://a.example, https://b.example ,, ");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_parse_origins_empty() {
        assert!(parse_origins("").is_empty());
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn test_rate_limit_defaults() {
        let limits = RateLimitConfig::default();
        assert_eq!(limits.per_second, 1);
        assert_eq!(limits.burst, 50);
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            app_env: AppEnv::Development,
            store_backend: StoreBackend::Memory,
            database_url: None,
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
