//! Uploaded file service backed by object storage

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::StorageClient;
use crate::middleware::AuthUser;
use shared::{object_path, validate_content_type, validate_upload_size, StoredFile};

/// File service
#[derive(Clone)]
pub struct FileService {
    db: PgPool,
    storage: StorageClient,
    max_upload_bytes: usize,
}

/// An upload received from a multipart request
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredFileRow {
    id: Uuid,
    owner_id: Uuid,
    object_path: String,
    file_name: String,
    content_type: String,
    size_bytes: i64,
    public_url: String,
    created_at: DateTime<Utc>,
}

impl From<StoredFileRow> for StoredFile {
    fn from(row: StoredFileRow) -> Self {
        StoredFile {
            id: row.id,
            owner_id: row.owner_id,
            object_path: row.object_path,
            file_name: row.file_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            public_url: row.public_url,
            created_at: row.created_at,
        }
    }
}

impl FileService {
    /// Create a new FileService instance
    pub fn new(db: PgPool, storage: StorageClient, max_upload_bytes: usize) -> Self {
        Self {
            db,
            storage,
            max_upload_bytes,
        }
    }

    /// Validate and store an upload, then record its metadata
    pub async fn upload(&self, owner_id: Uuid, upload: Upload) -> AppResult<StoredFile> {
        validate_content_type(&upload.content_type)
            .map_err(|m| AppError::validation("file", m))?;
        validate_upload_size(upload.bytes.len(), self.max_upload_bytes)
            .map_err(|m| AppError::validation("file", m))?;

        let file_id = Uuid::new_v4();
        let path = object_path(owner_id, file_id, &upload.file_name);
        let size_bytes = upload.bytes.len() as i64;

        let public_url = self
            .storage
            .put_object(&path, &upload.content_type, upload.bytes)
            .await?;

        let inserted = sqlx::query_as::<_, StoredFileRow>(
            r#"
            INSERT INTO stored_files (id, owner_id, object_path, file_name, content_type,
                                      size_bytes, public_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, owner_id, object_path, file_name, content_type, size_bytes,
                      public_url, created_at
            "#,
        )
        .bind(file_id)
        .bind(owner_id)
        .bind(&path)
        .bind(&upload.file_name)
        .bind(&upload.content_type)
        .bind(size_bytes)
        .bind(&public_url)
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(row) => {
                tracing::info!(file_id = %row.id, %owner_id, size_bytes, "File uploaded");
                Ok(row.into())
            }
            Err(e) => {
                // Do not leave an orphaned object behind
                if let Err(cleanup) = self.storage.delete_object(&path).await {
                    tracing::warn!(path = %path, error = %cleanup, "Failed to remove orphaned upload");
                }
                Err(e.into())
            }
        }
    }

    /// Files uploaded by the caller, newest first
    pub async fn list(&self, owner_id: Uuid) -> AppResult<Vec<StoredFile>> {
        let rows = sqlx::query_as::<_, StoredFileRow>(
            r#"
            SELECT id, owner_id, object_path, file_name, content_type, size_bytes,
                   public_url, created_at
            FROM stored_files
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StoredFile::from).collect())
    }

    /// Remove a file from storage and forget it
    pub async fn delete(&self, user: &AuthUser, file_id: Uuid) -> AppResult<()> {
        let row = sqlx::query_as::<_, StoredFileRow>(
            r#"
            SELECT id, owner_id, object_path, file_name, content_type, size_bytes,
                   public_url, created_at
            FROM stored_files
            WHERE id = $1
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File".to_string()))?;

        user.require_owner(row.owner_id)?;

        self.storage.delete_object(&row.object_path).await?;

        sqlx::query("DELETE FROM stored_files WHERE id = $1")
            .bind(file_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%file_id, "File deleted");
        Ok(())
    }
}
