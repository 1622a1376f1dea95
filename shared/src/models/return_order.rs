//! Return order models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::status::ReturnOrderStatus;

/// A return raised against a delivered order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnOrder {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: ReturnOrderStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for raising a return
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReturnOrderInput {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}
