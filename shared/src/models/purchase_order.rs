//! Purchase order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::status::{PurchaseOrderDeliveryStatus, PurchaseOrderStatus};

/// A purchase order raised against a vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub vendor_id: Uuid,
    /// Approval status; `Completed` is terminal
    pub po_status: PurchaseOrderStatus,
    /// Delivery status, moved by goods receipt notes
    pub status: PurchaseOrderDeliveryStatus,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub total_cost: Decimal,
    pub lines: Vec<PurchaseOrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a purchase order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

impl PurchaseOrderLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity)
    }
}

pub fn calculate_purchase_order_total(lines: &[PurchaseOrderLine]) -> Decimal {
    lines.iter().map(PurchaseOrderLine::line_total).sum()
}

/// Input for raising a purchase order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub vendor_id: Uuid,
    pub expected_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub lines: Vec<PurchaseOrderLine>,
}

/// Partial purchase order update; `po_status` is checked by the transition policy
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePurchaseOrderInput {
    pub po_status: Option<String>,
    pub expected_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub lines: Option<Vec<PurchaseOrderLine>>,
}

impl UpdatePurchaseOrderInput {
    /// Whether the update touches anything besides `po_status`
    pub fn has_non_status_changes(&self) -> bool {
        self.expected_date.is_some() || self.notes.is_some() || self.lines.is_some()
    }
}
