//! HTTP handlers

pub mod auth;
pub mod file;
pub mod grn;
pub mod health;
pub mod notification;
pub mod order;
pub mod product;
pub mod purchase_order;
pub mod return_order;
pub mod status;

pub use auth::*;
pub use file::*;
pub use grn::*;
pub use health::*;
pub use notification::*;
pub use order::*;
pub use product::*;
pub use purchase_order::*;
pub use return_order::*;
pub use status::*;

use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::Pagination;

use crate::error::{AppError, AppResult};
use crate::services::status_write::StatusChange;

/// `?page=&per_page=` on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }
}

/// Body of a successful status write:
/// `{ "message": ..., "<key>": entity, "previous_status": ... }`
pub(crate) fn status_changed<T: Serialize>(
    key: &str,
    label: &str,
    change: StatusChange<T>,
) -> AppResult<Json<Value>> {
    let entity = serde_json::to_value(&change.entity)
        .map_err(|e| AppError::Internal(format!("Serializing {}: {}", key, e)))?;

    let mut body = Map::new();
    body.insert(
        "message".to_string(),
        Value::String(format!("{} status updated", label)),
    );
    body.insert(key.to_string(), entity);
    body.insert(
        "previous_status".to_string(),
        Value::String(change.previous_status),
    );
    Ok(Json(Value::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changed_body_shape() {
        let change = StatusChange {
            entity: serde_json::json!({ "id": 7, "status": "Processed" }),
            previous_status: "Received".to_string(),
        };
        let Json(body) = status_changed("return_order", "Return order", change).unwrap();

        assert_eq!(body["message"], "Return order status updated");
        assert_eq!(body["return_order"]["status"], "Processed");
        assert_eq!(body["previous_status"], "Received");
    }

    #[test]
    fn test_page_query_defaults() {
        let pagination = PageQuery::default().pagination();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 20);
    }
}
