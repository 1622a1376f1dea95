//! Vendor and customer account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::status::ActorRole;

/// An authenticated platform account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub role: ActorRole,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration payload shared by vendors and customers
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub phone: Option<String>,
    /// Required for vendors, ignored for customers
    #[validate(length(min = 1, max = 200))]
    pub business_name: Option<String>,
}

/// Email and password login
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}
