//! Grocery Platform - Backend Server
//!
//! Vendor and customer API for a grocery marketplace: catalogue, orders,
//! purchase orders, goods receipt notes, returns and notifications, all
//! guarded by a shared status transition policy.

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod external;
mod handlers;
mod middleware;
mod routes;
mod services;

pub use config::Config;
use external::StorageClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub storage: StorageClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Grocery Platform Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let storage = StorageClient::new(&config.storage)?;

    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        storage,
    };

    let app = create_app(state)?;

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `GROCERY_LOG_FORMAT=json` switches to structured output
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grocery_server=debug,tower_http=debug,sqlx=warn".into());

    let json = std::env::var("GROCERY_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> anyhow::Result<Router> {
    let cors = state.config.cors.layer()?;
    if state.config.cors.allowed_origins.is_empty() {
        tracing::warn!("No CORS origins configured; browsers on other origins will be refused");
    }

    Ok(Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state))
}

/// Root endpoint
async fn root() -> &'static str {
    "Grocery Platform API v1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsConfig, DatabaseConfig, JwtConfig, ServerConfig, StorageConfig};
    use crate::middleware::auth::Claims;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use shared::ActorRole;
    use tower::ServiceExt;

    const SECRET: &str = "unit-test-secret-with-at-least-32-chars";
    const MAX_UPLOAD: usize = 5 * 1024 * 1024;
    const BOUNDARY: &str = "grocery-test-boundary";

    fn test_state() -> AppState {
        let config = Config {
            environment: "test".to_string(),
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/grocery_test".to_string(),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: JwtConfig {
                secret: SECRET.to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 604800,
            },
            cors: CorsConfig::default(),
            // Nothing listens here, so an accepted upload fails at the storage call
            storage: StorageConfig {
                endpoint: "http://127.0.0.1:9".to_string(),
                bucket: "uploads".to_string(),
                service_key: "test-key".to_string(),
                max_upload_bytes: MAX_UPLOAD,
            },
        };

        AppState {
            db: PgPoolOptions::new()
                .connect_lazy(&config.database.url)
                .unwrap(),
            storage: StorageClient::new(&config.storage).unwrap(),
            config: Arc::new(config),
        }
    }

    fn vendor_token() -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            role: ActorRole::Vendor,
            exp: now + 600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn upload_request(size: usize) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"crate.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend(std::iter::repeat(0u8).take(size));
        body.extend(format!("\r\n--{BOUNDARY}--\r\n").into_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/files")
            .header(header::AUTHORIZATION, format!("Bearer {}", vendor_token()))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn error_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_above_default_body_limit_reaches_storage() {
        let app = create_app(test_state()).unwrap();

        let response = app.oneshot(upload_request(3 * 1024 * 1024)).await.unwrap();

        // The body was read in full and handed to the storage client
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = error_json(response).await;
        assert_eq!(json["error"]["code"], "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn test_upload_over_configured_limit_is_rejected_with_limit() {
        let app = create_app(test_state()).unwrap();

        let response = app.oneshot(upload_request(MAX_UPLOAD + 256 * 1024)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = error_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["field"], "file");
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains(&MAX_UPLOAD.to_string()), "{}", message);
    }
}
