//! Compare-and-swap status writes shared by the document services
//!
//! Status columns are only ever written with
//! `UPDATE ... WHERE id = $1 AND <column> = <expected>`, so a concurrent
//! change between the read and the write surfaces as a conflict instead of
//! being silently overwritten. A miss is resolved here into `NotFound` or
//! `Conflict`.

use serde::Serialize;
use shared::StatusVocabulary;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Tables whose rows carry a status column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTable {
    Orders,
    PurchaseOrders,
    Grns,
    ReturnOrders,
}

impl StatusTable {
    pub fn name(&self) -> &'static str {
        match self {
            StatusTable::Orders => "orders",
            StatusTable::PurchaseOrders => "purchase_orders",
            StatusTable::Grns => "goods_receipt_notes",
            StatusTable::ReturnOrders => "return_orders",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusTable::Orders => "Order",
            StatusTable::PurchaseOrders => "Purchase order",
            StatusTable::Grns => "GRN",
            StatusTable::ReturnOrders => "Return order",
        }
    }
}

/// A successful status write and the status it replaced
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange<T> {
    pub entity: T,
    pub previous_status: String,
}

/// Explain why a conditional update matched no row
pub async fn resolve_cas_miss(db: &PgPool, table: StatusTable, id: Uuid) -> AppError {
    let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table.name());

    match sqlx::query_scalar::<_, bool>(&query)
        .bind(id)
        .fetch_one(db)
        .await
    {
        Ok(true) => {
            tracing::warn!(table = table.name(), %id, "Status changed concurrently");
            cas_conflict(table)
        }
        Ok(false) => AppError::NotFound(table.label().to_string()),
        Err(e) => e.into(),
    }
}

/// Conflict reported when the stored status no longer matches the expected one
pub fn cas_conflict(table: StatusTable) -> AppError {
    AppError::Conflict {
        resource: "status".to_string(),
        message: format!(
            "{} status was changed by another request; reload and retry",
            table.label()
        ),
    }
}

/// Parse a status read back from the database
pub fn stored_status<S: StatusVocabulary>(raw: &str) -> AppResult<S> {
    S::parse(raw).map_err(|_| {
        AppError::Internal(format!(
            "Stored {} status '{}' is outside its vocabulary",
            S::KIND.as_str(),
            raw
        ))
    })
}
