//! HTTP handlers for return orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use shared::{CreateReturnOrderInput, PaginatedResponse, ReturnOrder, StatusUpdateInput};
use uuid::Uuid;

use super::{status_changed, PageQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ReturnOrderService;
use crate::AppState;

/// List returns visible to the caller
pub async fn list_return_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ReturnOrder>>> {
    let service = ReturnOrderService::new(state.db);
    Ok(Json(
        service
            .list_return_orders(&user, page.pagination())
            .await?,
    ))
}

/// Raise a return against a delivered order
pub async fn create_return_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateReturnOrderInput>,
) -> AppResult<(StatusCode, Json<ReturnOrder>)> {
    let service = ReturnOrderService::new(state.db);
    let return_order = service.create_return_order(&user, input).await?;
    Ok((StatusCode::CREATED, Json(return_order)))
}

/// Get a return
pub async fn get_return_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ReturnOrder>> {
    let service = ReturnOrderService::new(state.db);
    Ok(Json(service.get_return_order(&user, return_id).await?))
}

/// Change a return's status
pub async fn update_return_order_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<StatusUpdateInput>,
) -> AppResult<Json<Value>> {
    let service = ReturnOrderService::new(state.db);
    let change = service
        .update_status(&user, return_id, &input.status)
        .await?;
    status_changed("return_order", "Return order", change)
}
