//! Customer order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::status::{OrderLifecycleStatus, OrderStatus};

/// A customer order placed with one vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    /// Fulfilment status
    pub status: OrderStatus,
    /// Role-keyed lifecycle status
    pub lifecycle_status: OrderLifecycleStatus,
    pub total_amount: Decimal,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order, priced at the time it was placed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of all line totals
pub fn calculate_order_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

/// Input for placing an order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub vendor_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub items: Vec<OrderItemInput>,
}

/// Requested product and quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}
