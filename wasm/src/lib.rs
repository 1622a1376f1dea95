//! WebAssembly module for the grocery platform
//!
//! Lets the vendor and customer apps ask the same status policy the server
//! enforces, so only permitted status buttons are offered:
//! - Valid statuses per document kind
//! - Transition checks per role
//! - GRN cascade preview
//! - Order totals

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

pub use shared::models::*;
pub use shared::status::*;
pub use shared::types::*;

fn parse_kind(kind: &str) -> Option<DocumentKind> {
    DocumentKind::from_slug(kind)
}

fn statuses_for(kind: &str) -> Vec<&'static str> {
    parse_kind(kind)
        .map(|k| valid_statuses(k).to_vec())
        .unwrap_or_default()
}

fn decide(kind: &str, current: &str, requested: &str, role: &str) -> Result<bool, String> {
    let kind = parse_kind(kind).ok_or_else(|| format!("Unknown document kind '{}'", kind))?;
    let role = ActorRole::from_str(role).ok_or_else(|| format!("Unknown role '{}'", role))?;
    can_transition(kind, current, requested, role).map_err(|e| e.to_string())
}

fn grn_cascade(previous: Option<&str>, requested: &str) -> Result<Option<&'static str>, String> {
    let previous = previous
        .map(GrnStatus::parse)
        .transpose()
        .map_err(|e| e.to_string())?;
    let plan = plan_grn_status(previous, requested).map_err(|e| e.to_string())?;
    Ok(plan.cascade.map(|status| status.as_str()))
}

/// Valid statuses for a document kind; empty for an unknown kind
#[wasm_bindgen(js_name = validStatuses)]
pub fn valid_statuses_js(kind: &str) -> js_sys::Array {
    let statuses = statuses_for(kind);
    if statuses.is_empty() {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "validStatuses: unknown document kind '{}'",
            kind
        )));
    }
    statuses.into_iter().map(JsValue::from_str).collect()
}

/// Whether `role` may move a document from `current` to `requested`.
/// Throws when a status, kind or role is unknown.
#[wasm_bindgen(js_name = canTransition)]
pub fn can_transition_js(
    kind: &str,
    current: &str,
    requested: &str,
    role: &str,
) -> Result<bool, JsValue> {
    decide(kind, current, requested, role).map_err(|e| JsValue::from_str(&e))
}

/// Delivery status a GRN write would push onto its purchase order, if any
#[wasm_bindgen(js_name = grnCascade)]
pub fn grn_cascade_js(previous: Option<String>, requested: &str) -> Result<Option<String>, JsValue> {
    grn_cascade(previous.as_deref(), requested)
        .map(|cascade| cascade.map(str::to_string))
        .map_err(|e| JsValue::from_str(&e))
}

/// Order total from a JSON array of `{product_id, product_name, quantity, unit_price}`
#[wasm_bindgen(js_name = orderTotal)]
pub fn order_total_js(items_json: &str) -> Result<String, JsValue> {
    let items: Vec<OrderItem> = serde_json::from_str(items_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid items JSON: {}", e)))?;
    let total: Decimal = calculate_order_total(&items);
    Ok(total.round_dp(2).to_string())
}
