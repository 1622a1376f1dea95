//! Object Storage Client
//!
//! Client for the hosted object store holding product images and documents.

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

/// Client for the object storage REST API
#[derive(Clone)]
pub struct StorageClient {
    endpoint: String,
    bucket: String,
    service_key: String,
    http_client: Client,
}

/// Error body returned by the storage API
#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl StorageClient {
    /// Create a new storage client
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
            http_client,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.endpoint, self.bucket, path)
    }

    /// Publicly readable URL of an object
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.endpoint, self.bucket, path)
    }

    /// Upload an object; fails if the path is already taken
    pub async fn put_object(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        let response = self
            .http_client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("Upload failed: {}", e)))?;

        Self::check(response).await?;
        Ok(self.public_url(path))
    }

    /// Delete an object; a missing object is not an error
    pub async fn delete_object(&self, path: &str) -> AppResult<()> {
        let response = self
            .http_client
            .delete(self.object_url(path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("Delete failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(path, "Object already absent from storage");
            return Ok(());
        }

        Self::check(response).await
    }

    async fn check(response: reqwest::Response) -> AppResult<()> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StorageErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or(body);

        Err(AppError::StorageError(format!(
            "API returned {}: {}",
            status, detail
        )))
    }
}
