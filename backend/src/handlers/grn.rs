//! HTTP handlers for goods receipt notes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use shared::{CreateGrnInput, GoodsReceiptNote, PaginatedResponse, StatusUpdateInput};
use uuid::Uuid;

use super::{status_changed, PageQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::grn::GrnRecord;
use crate::services::GrnService;
use crate::AppState;

/// `?po_id=&page=&per_page=`
#[derive(Debug, Deserialize)]
pub struct GrnQuery {
    pub po_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List GRNs, optionally for one purchase order
pub async fn list_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<GrnQuery>,
) -> AppResult<Json<PaginatedResponse<GoodsReceiptNote>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let service = GrnService::new(state.db);
    Ok(Json(
        service
            .list_grns(&user, query.po_id, page.pagination())
            .await?,
    ))
}

/// Record a GRN against a purchase order
pub async fn create_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateGrnInput>,
) -> AppResult<(StatusCode, Json<GrnRecord>)> {
    let service = GrnService::new(state.db);
    let record = service.create_grn(&user, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a GRN
pub async fn get_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(grn_id): Path<Uuid>,
) -> AppResult<Json<GoodsReceiptNote>> {
    let service = GrnService::new(state.db);
    Ok(Json(service.get_grn(&user, grn_id).await?))
}

/// Change a GRN's status; the parent purchase order follows
pub async fn update_grn_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(grn_id): Path<Uuid>,
    Json(input): Json<StatusUpdateInput>,
) -> AppResult<Json<Value>> {
    let service = GrnService::new(state.db);
    let (change, cascade) = service.update_status(&user, grn_id, &input.status).await?;

    let Json(mut body) = status_changed("grn", "GRN", change)?;
    if let Value::Object(map) = &mut body {
        map.insert(
            "purchase_order_cascade".to_string(),
            serde_json::to_value(cascade).unwrap_or(Value::Null),
        );
    }
    Ok(Json(body))
}
