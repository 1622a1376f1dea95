//! Product catalogue models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A product listed by a vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub unit: String,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for listing a new product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub price: Decimal,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

/// Partial product update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub price: Option<Decimal>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Catalogue filters accepted by the product listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
