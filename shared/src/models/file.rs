//! Stored file metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file uploaded to object storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub object_path: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub public_url: String,
    pub created_at: DateTime<Utc>,
}

/// Object path for an upload: `{owner}/{file id}-{sanitized name}`
pub fn object_path(owner_id: Uuid, file_id: Uuid, file_name: &str) -> String {
    format!("{}/{}-{}", owner_id, file_id, sanitize_file_name(file_name))
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_name(file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
