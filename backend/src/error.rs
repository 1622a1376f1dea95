//! Error handling for the grocery platform backend
//!
//! Every error renders as `{ "error": { code, message, field? } }`; invalid
//! status values additionally carry the `validStatuses` of the document kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::StatusError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{message}")]
    InvalidStatus {
        message: String,
        valid_statuses: Vec<String>,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Status policy errors
    #[error("Terminal state violation: {0}")]
    TerminalStateViolation(String),

    #[error("Transition not permitted: {0}")]
    TransitionNotPermitted(String),

    // External service errors
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        let message = err.to_string();
        match err {
            StatusError::InvalidStatus { valid, .. } => AppError::InvalidStatus {
                message,
                valid_statuses: valid.iter().map(|s| s.to_string()).collect(),
            },
            StatusError::NotFound { kind } => AppError::NotFound(kind.label().to_string()),
            StatusError::TerminalStateViolation { .. } => AppError::TerminalStateViolation(message),
            StatusError::NotPermitted { .. } => AppError::TransitionNotPermitted(message),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors.field_errors().into_iter().next();
        match first {
            Some((field, field_errors)) => {
                let message = field_errors
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| {
                        let code = field_errors
                            .first()
                            .map(|e| e.code.to_string())
                            .unwrap_or_default();
                        format!("{} is invalid ({})", field, code)
                    });
                AppError::Validation {
                    field: field.to_string(),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    #[serde(rename = "validStatuses", skip_serializing_if = "Option::is_none")]
    pub valid_statuses: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut valid_statuses = None;

        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_CREDENTIALS", "Invalid email or password"),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new("FORBIDDEN", message.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::InvalidStatus {
                message,
                valid_statuses: valid,
            } => {
                valid_statuses = Some(valid.clone());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail::new("INVALID_STATUS", message.clone()).with_field("status"),
                )
            }
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
                .with_field(field),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::TerminalStateViolation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("TERMINAL_STATE_VIOLATION", msg.clone()),
            ),
            AppError::TransitionNotPermitted(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new("TRANSITION_NOT_PERMITTED", msg.clone()),
            ),
            AppError::StorageError(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("STORAGE_ERROR", format!("Storage error: {}", msg)),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(err) if is_unique_violation(err) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_ENTRY", "A record with these values already exists"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: error_detail,
                valid_statuses,
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{can_transition, check_transition, ActorRole, DocumentKind};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_status_lists_valid_statuses() {
        let err = can_transition(DocumentKind::Grn, "Received", "Shipped", ActorRole::Vendor)
            .unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["validStatuses"], serde_json::json!(["Received", "Rejected"]));
        assert_eq!(body["error"]["code"], "INVALID_STATUS");
    }

    #[tokio::test]
    async fn test_terminal_state_maps_to_unprocessable() {
        let err = check_transition(
            DocumentKind::PurchaseOrder,
            "Completed",
            "Draft",
            ActorRole::Admin,
        )
        .unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert!(body.get("validStatuses").is_none());
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("immutable"));
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = AppError::NotFound("Purchase order".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Purchase order not found");
    }

    #[test]
    fn test_not_permitted_is_forbidden() {
        let err = check_transition(
            DocumentKind::OrderLifecycle,
            "pending",
            "approved",
            ActorRole::Customer,
        )
        .unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = AppError::Internal("connection string leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
