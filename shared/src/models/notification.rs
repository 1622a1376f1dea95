//! In-app notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a notification is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderStatus,
    ReturnStatus,
    PurchaseOrder,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderStatus => "order_status",
            NotificationKind::ReturnStatus => "return_status",
            NotificationKind::PurchaseOrder => "purchase_order",
            NotificationKind::System => "system",
        }
    }
}

/// A notification shown to one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Notification about a status change on a document
pub fn status_change_message(label: &str, previous: &str, next: &str) -> String {
    format!("{} status changed from {} to {}", label, previous, next)
}
