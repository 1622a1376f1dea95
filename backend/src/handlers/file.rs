//! HTTP handlers for file uploads

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use shared::StoredFile;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::file::Upload;
use crate::services::FileService;
use crate::AppState;

fn file_service(state: &AppState) -> FileService {
    FileService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.storage.max_upload_bytes,
    )
}

fn multipart_error(err: MultipartError, max_upload_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::validation(
            "file",
            format!("File exceeds the maximum upload size of {} bytes", max_upload_bytes),
        )
    } else {
        AppError::validation("file", format!("Malformed multipart body: {}", err))
    }
}

/// Upload the multipart field named `file`
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<StoredFile>)> {
    let mut upload = None;

    let max_upload_bytes = state.config.storage.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_upload_bytes))?;

        upload = Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| AppError::validation("file", "Missing 'file' field"))?;
    let stored = file_service(&state).upload(user.account_id, upload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Files uploaded by the caller
pub async fn list_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<StoredFile>>> {
    Ok(Json(file_service(&state).list(user.account_id).await?))
}

/// Delete an uploaded file
pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(file_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    file_service(&state).delete(&user, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
