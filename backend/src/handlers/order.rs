//! HTTP handlers for customer orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use shared::{ActorRole, CreateOrderInput, Order, PaginatedResponse, StatusUpdateInput};
use uuid::Uuid;

use super::{status_changed, PageQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::OrderService;
use crate::AppState;

/// List orders visible to the caller
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let service = OrderService::new(state.db);
    Ok(Json(service.list_orders(&user, page.pagination()).await?))
}

/// Place an order
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    user.require_any(&[ActorRole::Customer])?;
    let service = OrderService::new(state.db);
    let order = service.create_order(user.account_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get an order
pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db);
    Ok(Json(service.get_order(&user, order_id).await?))
}

/// Set the fulfilment status of an order
pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<StatusUpdateInput>,
) -> AppResult<Json<Value>> {
    let service = OrderService::new(state.db);
    let change = service.update_status(&user, order_id, &input.status).await?;
    status_changed("order", "Order", change)
}

/// Move an order through its lifecycle
pub async fn update_order_lifecycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<StatusUpdateInput>,
) -> AppResult<Json<Value>> {
    let service = OrderService::new(state.db);
    let change = service
        .update_lifecycle_status(&user, order_id, &input.status)
        .await?;
    status_changed("order", "Order lifecycle", change)
}
