//! Notification service for in-app notifications
//!
//! Notifications are written as a side effect of status changes. Callers
//! treat delivery as best-effort: [`NotificationService::notify_quietly`]
//! logs failures instead of returning them.

use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{Notification, NotificationKind};

/// Notification service for managing notifications
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    title: String,
    message: String,
    entity_type: Option<String>,
    entity_id: Option<Uuid>,
    is_read: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    read_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            is_read: row.is_read,
            created_at: row.created_at,
            read_at: row.read_at,
        }
    }
}

/// A notification to be written
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
}

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Write a notification
    pub async fn notify(&self, notification: NewNotification) -> AppResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (recipient_id, kind, title, message, entity_type, entity_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, recipient_id, kind, title, message, entity_type, entity_id,
                      is_read, created_at, read_at
            "#,
        )
        .bind(notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.entity_type)
        .bind(notification.entity_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Write a notification, logging instead of failing
    pub async fn notify_quietly(&self, notification: NewNotification) {
        let recipient_id = notification.recipient_id;
        if let Err(e) = self.notify(notification).await {
            tracing::warn!(%recipient_id, error = %e, "Failed to write notification");
        }
    }

    /// List notifications for a recipient, newest first
    pub async fn list(
        &self,
        recipient_id: Uuid,
        query: &NotificationQuery,
    ) -> AppResult<Vec<Notification>> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);

        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, kind, title, message, entity_type, entity_id,
                   is_read, created_at, read_at
            FROM notifications
            WHERE recipient_id = $1 AND ($2 = false OR is_read = false)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(recipient_id)
        .bind(query.unread_only)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    /// Get unread notification count
    pub async fn unread_count(&self, recipient_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = false",
        )
        .bind(recipient_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Mark notification as read
    pub async fn mark_as_read(&self, recipient_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        Ok(())
    }

    /// Mark all notifications as read
    pub async fn mark_all_as_read(&self, recipient_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = NOW()
            WHERE recipient_id = $1 AND is_read = false
            "#,
        )
        .bind(recipient_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
