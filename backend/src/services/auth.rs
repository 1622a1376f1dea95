//! Authentication service for vendor/customer registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::Claims;
use shared::{validate_password, validate_phone, Account, ActorRole, LoginInput, RegisterInput};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Response after successful registration or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub account: Account,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Account row from database
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    role: String,
    email: String,
    password_hash: String,
    name: String,
    phone: Option<String>,
    business_name: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> AppResult<Account> {
        let role = ActorRole::from_str(&self.role).ok_or_else(|| {
            AppError::Internal(format!("Stored account role '{}' is unknown", self.role))
        })?;

        Ok(Account {
            id: self.id,
            role,
            email: self.email,
            name: self.name,
            phone: self.phone,
            business_name: self.business_name,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Register a vendor or customer account
    pub async fn register(&self, role: ActorRole, input: RegisterInput) -> AppResult<AuthResponse> {
        if !matches!(role, ActorRole::Vendor | ActorRole::Customer) {
            return Err(AppError::Forbidden(format!(
                "Self-registration is not available for role '{}'",
                role
            )));
        }

        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;
        if let Some(phone) = &input.phone {
            validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let business_name = match role {
            ActorRole::Vendor => Some(input.business_name.clone().ok_or_else(|| {
                AppError::validation("business_name", "Business name is required for vendors")
            })?),
            _ => None,
        };

        let email = normalize_email(&input.email);

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts WHERE email = $1")
                .bind(&email)
                .fetch_one(&self.db)
                .await?;

        if existing > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash_password(input.password).await?;

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (role, email, password_hash, name, phone, business_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, role, email, password_hash, name, phone, business_name,
                      is_active, created_at
            "#,
        )
        .bind(role.as_str())
        .bind(&email)
        .bind(&password_hash)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&business_name)
        .fetch_one(&self.db)
        .await?;

        let account = row.into_account()?;
        tracing::info!(account_id = %account.id, role = %role, "Account registered");

        let tokens = self.issue_tokens(account.id, account.role).await?;
        Ok(AuthResponse { account, tokens })
    }

    /// Authenticate with email and password; only `roles` may log in here
    pub async fn login(&self, roles: &[ActorRole], input: LoginInput) -> AppResult<AuthResponse> {
        input.validate()?;

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, role, email, password_hash, name, phone, business_name,
                   is_active, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(&input.email))
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let password_hash = row.password_hash.clone();
        if !verify_password(input.password, password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let account = row.into_account()?;

        // Same response as a bad password so roles cannot be probed
        if !roles.contains(&account.role) {
            return Err(AppError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = $1")
            .bind(account.id)
            .execute(&self.db)
            .await?;

        let tokens = self.issue_tokens(account.id, account.role).await?;
        Ok(AuthResponse { account, tokens })
    }

    /// Exchange a refresh token for a new token pair; the old token is revoked
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = hash_token(refresh_token);

        let (account_id, role) = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM accounts a
            WHERE rt.token_hash = $1
              AND rt.account_id = a.id
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND a.is_active = true
            RETURNING a.id, a.role
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let role = ActorRole::from_str(&role)
            .ok_or_else(|| AppError::Internal(format!("Stored account role '{}' is unknown", role)))?;

        self.issue_tokens(account_id, role).await
    }

    /// Revoke a refresh token
    pub async fn logout(&self, account_id: Uuid, refresh_token: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = $1 AND account_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(hash_token(refresh_token))
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Fetch the caller's account
    pub async fn me(&self, account_id: Uuid) -> AppResult<Account> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, role, email, password_hash, name, phone, business_name,
                   is_active, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Account".to_string()))?
        .into_account()
    }

    /// Generate an access token and store a fresh refresh token
    async fn issue_tokens(&self, account_id: Uuid, role: ActorRole) -> AppResult<AuthTokens> {
        let tokens = self.generate_tokens(account_id, role, Utc::now())?;

        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (account_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(account_id)
        .bind(hash_token(&tokens.refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(tokens)
    }

    fn generate_tokens(
        &self,
        account_id: Uuid,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> AppResult<AuthTokens> {
        let claims = Claims {
            sub: account_id.to_string(),
            role,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// SHA-256 hex digest used to store refresh tokens
fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

async fn verify_password(password: String, password_hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    const SECRET: &str = "unit-test-secret-with-at-least-32-chars";

    fn service() -> AuthService {
        AuthService {
            db: sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/grocery_test")
                .unwrap(),
            jwt_secret: SECRET.to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
        }
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("refresh-token");
        assert_eq!(a, hash_token("refresh-token"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("other-token"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Shopper@Example.COM "), "shopper@example.com");
    }

    #[tokio::test]
    async fn test_generated_access_token_round_trips() {
        let service = service();
        let id = Uuid::new_v4();
        let tokens = service
            .generate_tokens(id, ActorRole::Delivery, Utc::now())
            .unwrap();

        let user = decode_access_token(&tokens.access_token, SECRET).unwrap();
        assert_eq!(user.account_id, id);
        assert_eq!(user.role, ActorRole::Delivery);
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let hashed = hash_password("correct horse 1".to_string()).await.unwrap();
        assert!(verify_password("correct horse 1".to_string(), hashed.clone())
            .await
            .unwrap());
        assert!(!verify_password("wrong".to_string(), hashed).await.unwrap());
    }
}
