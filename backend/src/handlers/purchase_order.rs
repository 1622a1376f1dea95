//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use shared::{
    CreatePurchaseOrderInput, PaginatedResponse, PurchaseOrder, UpdatePurchaseOrderInput,
};
use uuid::Uuid;

use super::{status_changed, PageQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::PurchaseOrderService;
use crate::AppState;

/// List purchase orders
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db);
    Ok(Json(
        service
            .list_purchase_orders(&user, page.pagination())
            .await?,
    ))
}

/// Raise a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    let service = PurchaseOrderService::new(state.db);
    let po = service.create_purchase_order(&user, input).await?;
    Ok((StatusCode::CREATED, Json(po)))
}

/// Get a purchase order
pub async fn get_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db);
    Ok(Json(service.get_purchase_order(&user, po_id).await?))
}

/// Update a purchase order, including its `po_status`
pub async fn update_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(po_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<Value>> {
    let service = PurchaseOrderService::new(state.db);
    let change = service.update_purchase_order(&user, po_id, input).await?;
    status_changed("purchase_order", "Purchase order", change)
}

/// Delete a draft purchase order
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = PurchaseOrderService::new(state.db);
    service.delete_purchase_order(&user, po_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
