//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use shared::{Account, ActorRole, LoginInput, RegisterInput};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthResponse, AuthTokens};
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a vendor account
pub async fn register_vendor(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.register(ActorRole::Vendor, body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register a customer account
pub async fn register_customer(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.register(ActorRole::Customer, body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Vendor portal login; admins sign in here too
pub async fn login_vendor(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service
        .login(&[ActorRole::Vendor, ActorRole::Admin], body)
        .await?;
    Ok(Json(response))
}

/// Customer app login; delivery staff use the same app
pub async fn login_customer(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service
        .login(&[ActorRole::Customer, ActorRole::Delivery], body)
        .await?;
    Ok(Json(response))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// Revoke the given refresh token
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<RefreshRequest>,
) -> AppResult<StatusCode> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    auth_service.logout(user.account_id, &body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The authenticated account
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Account>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(auth_service.me(user.account_id).await?))
}
