//! Authentication middleware
//!
//! JWT authentication and role-based access checks

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::ActorRole;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated account extracted from the access token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub role: ActorRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Fail with 403 unless the caller has one of `roles`
    pub fn require_any(&self, roles: &[ActorRole]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' cannot perform this action",
                self.role
            )))
        }
    }

    /// Fail with 403 unless the caller owns the resource or is an admin
    pub fn require_owner(&self, owner_id: Uuid) -> AppResult<()> {
        if self.is_admin() || self.account_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have access to this resource".to_string(),
            ))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: ActorRole,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate an access token
pub fn decode_access_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        account_id,
        role: claims.role,
    })
}

/// Authentication middleware that validates the bearer token and stores the
/// caller in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    match decode_access_token(bearer.token(), &state.config.jwt.secret) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                    },
                    valid_statuses: None,
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
