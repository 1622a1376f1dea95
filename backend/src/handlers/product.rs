//! HTTP handlers for the product catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    ActorRole, CreateProductInput, PaginatedResponse, Product, ProductFilter, UpdateProductInput,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ProductService;
use crate::AppState;

/// List catalogue products
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.list_products(filter).await?))
}

/// Get a single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.get_product(product_id).await?))
}

/// Create a product for the calling vendor
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    user.require_any(&[ActorRole::Vendor, ActorRole::Admin])?;
    let service = ProductService::new(state.db);
    let product = service.create_product(user.account_id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    user.require_any(&[ActorRole::Vendor, ActorRole::Admin])?;
    let service = ProductService::new(state.db);
    Ok(Json(service.update_product(&user, product_id, input).await?))
}

/// Withdraw a product from the catalogue
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_any(&[ActorRole::Vendor, ActorRole::Admin])?;
    let service = ProductService::new(state.db);
    service.deactivate_product(&user, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
