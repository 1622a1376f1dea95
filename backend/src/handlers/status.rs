//! Status vocabulary lookup

use axum::{extract::Path, Json};
use serde::Serialize;
use shared::{valid_statuses, DocumentKind};

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct StatusListResponse {
    pub kind: &'static str,
    #[serde(rename = "validStatuses")]
    pub valid_statuses: &'static [&'static str],
}

/// Valid statuses for a document kind, e.g. `/statuses/purchase_order`
pub async fn list_statuses(Path(kind): Path<String>) -> AppResult<Json<StatusListResponse>> {
    let kind = DocumentKind::from_slug(&kind).ok_or_else(|| {
        let known: Vec<&str> = DocumentKind::ALL.iter().map(|k| k.as_str()).collect();
        AppError::validation(
            "kind",
            format!("Unknown document kind '{}'; expected one of {}", kind, known.join(", ")),
        )
    })?;

    Ok(Json(StatusListResponse {
        kind: kind.as_str(),
        valid_statuses: valid_statuses(kind),
    }))
}
