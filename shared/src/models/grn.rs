//! Goods receipt note models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::status::GrnStatus;

/// Confirmation that goods against a purchase order were received or rejected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceiptNote {
    pub id: Uuid,
    pub po_id: Uuid,
    pub status: GrnStatus,
    pub received_by: Uuid,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a goods receipt note
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGrnInput {
    pub po_id: Uuid,
    pub status: String,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}
