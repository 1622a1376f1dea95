//! Configuration management for the grocery platform backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with GROCERY_ prefix
//!
//! Secrets, storage credentials and CORS origins have no defaults and must be
//! supplied by the deployment.

use axum::http::{HeaderValue, Method};
use config::{ConfigError, Environment, File};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Cross-origin access configuration
    pub cors: CorsConfig,

    /// Object storage configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    /// Origins allowed to call the API; `*` allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Base URL of the object storage REST API
    pub endpoint: String,

    /// Bucket uploads are written to
    pub bucket: String,

    /// Service key sent as bearer token
    pub service_key: String,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("GROCERY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("storage.max_upload_bytes", 5 * 1024 * 1024)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (GROCERY_ prefix)
            .add_source(
                Environment::with_prefix("GROCERY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt.secret must be at least 32 characters".to_string(),
            ));
        }
        self.cors.layer()?;
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// Room for multipart boundaries and part headers around the file bytes
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

impl StorageConfig {
    /// Request body limit for upload routes
    pub fn request_body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

impl CorsConfig {
    /// Translate the configured origins into a tower-http origin policy
    pub fn allow_origin(&self) -> Result<AllowOrigin, ConfigError> {
        if self.allowed_origins.iter().any(|origin| origin == "*") {
            return Ok(AllowOrigin::from(Any));
        }

        let origins = self
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim()).map_err(|_| {
                    ConfigError::Message(format!("Invalid CORS origin: {}", origin))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AllowOrigin::list(origins))
    }

    /// CORS layer attached to every response
    pub fn layer(&self) -> Result<CorsLayer, ConfigError> {
        Ok(CorsLayer::new()
            .allow_origin(self.allow_origin()?)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origins: &[&str]) -> CorsConfig {
        CorsConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn test_cors_accepts_origin_list() {
        assert!(cors(&["https://shop.example.com", "https://vendor.example.com"])
            .layer()
            .is_ok());
    }

    #[test]
    fn test_cors_wildcard() {
        assert!(cors(&["*"]).allow_origin().is_ok());
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        assert!(cors(&["https://bad\norigin"]).allow_origin().is_err());
    }

    #[test]
    fn test_upload_body_limit_covers_max_upload() {
        let storage = StorageConfig {
            endpoint: "http://storage.invalid".to_string(),
            bucket: "uploads".to_string(),
            service_key: String::new(),
            max_upload_bytes: 5 * 1024 * 1024,
        };
        assert!(storage.request_body_limit() > storage.max_upload_bytes);

        let unbounded = StorageConfig {
            max_upload_bytes: usize::MAX,
            ..storage
        };
        assert_eq!(unbounded.request_body_limit(), usize::MAX);
    }

    fn config_with(origins: &[&str]) -> Config {
        Config {
            environment: "test".to_string(),
            server: ServerConfig {
                port: 3000,
                host: "127.0.0.1".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/grocery_test".to_string(),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: JwtConfig {
                secret: "unit-test-secret-with-at-least-32-chars".to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 604800,
            },
            cors: cors(origins),
            storage: StorageConfig {
                endpoint: "http://storage.invalid".to_string(),
                bucket: "uploads".to_string(),
                service_key: String::new(),
                max_upload_bytes: 1024,
            },
        }
    }

    #[test]
    fn test_validate_checks_cors_origins() {
        assert!(config_with(&["https://shop.example.com"]).validate().is_ok());
        assert!(config_with(&["https://bad\norigin"]).validate().is_err());
    }

    #[test]
    fn test_empty_cors_list_is_valid() {
        assert!(CorsConfig::default().layer().is_ok());
    }
}
