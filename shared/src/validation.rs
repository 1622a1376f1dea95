//! Validation utilities for the grocery platform

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::models::{OrderItemInput, PurchaseOrderLine};

// ============================================================================
// Money and quantities
// ============================================================================

/// Prices are non-negative with at most two decimal places
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err("Price cannot be negative");
    }
    if price.normalize().scale() > 2 {
        return Err("Price must have at most two decimal places");
    }
    Ok(())
}

/// Ordered quantities must be between 1 and 10,000
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 1 {
        return Err("Quantity must be at least 1");
    }
    if quantity > 10_000 {
        return Err("Quantity must be at most 10000");
    }
    Ok(())
}

/// Order items: valid quantities and no product listed twice
pub fn validate_order_items(items: &[OrderItemInput]) -> Result<(), &'static str> {
    if items.is_empty() {
        return Err("An order must contain at least one item");
    }
    let mut seen = HashSet::new();
    for item in items {
        validate_quantity(item.quantity)?;
        if !seen.insert(item.product_id) {
            return Err("Each product may appear only once per order");
        }
    }
    Ok(())
}

/// Purchase order lines: valid quantities and unit costs
pub fn validate_purchase_order_lines(lines: &[PurchaseOrderLine]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("A purchase order must contain at least one line");
    }
    for line in lines {
        validate_quantity(line.quantity)?;
        validate_price(line.unit_cost)?;
    }
    Ok(())
}

// ============================================================================
// Accounts
// ============================================================================

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    Ok(())
}

/// Phone numbers: optional leading `+`, then 7-15 digits; spaces and dashes ignored
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let rest = phone.strip_prefix('+').unwrap_or(phone);
    if !rest
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    let digits = rest.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Phone number must have between 7 and 15 digits");
    }
    Ok(())
}

// ============================================================================
// Uploads
// ============================================================================

/// Content types accepted by the file store
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
];

pub fn validate_content_type(content_type: &str) -> Result<(), &'static str> {
    if ALLOWED_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err("Unsupported file type")
    }
}

pub fn validate_upload_size(size_bytes: usize, max_bytes: usize) -> Result<(), &'static str> {
    if size_bytes == 0 {
        return Err("File is empty");
    }
    if size_bytes > max_bytes {
        return Err("File exceeds the maximum upload size");
    }
    Ok(())
}
