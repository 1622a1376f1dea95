//! HTTP handlers for in-app notifications

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::Notification;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::notification::NotificationQuery;
use crate::services::NotificationService;
use crate::AppState;

/// Unread count response
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// Marked-as-read response
#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Get in-app notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let service = NotificationService::new(state.db);
    Ok(Json(service.list(user.account_id, &query).await?))
}

/// Get unread notification count
pub async fn get_unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<UnreadCountResponse>> {
    let service = NotificationService::new(state.db);
    let count = service.unread_count(user.account_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Mark notification as read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = NotificationService::new(state.db);
    service.mark_as_read(user.account_id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark all notifications as read
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let service = NotificationService::new(state.db);
    let updated = service.mark_all_as_read(user.account_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
