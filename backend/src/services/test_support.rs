//! Database fixtures for service tests
//!
//! Tests using these are `#[ignore]`d and need a scratch PostgreSQL database:
//!
//! ```text
//! GROCERY_TEST_DATABASE_URL=postgres://localhost/grocery_test cargo test -- --ignored
//! ```

use shared::ActorRole;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::middleware::AuthUser;

pub async fn pool() -> PgPool {
    let url = std::env::var("GROCERY_TEST_DATABASE_URL")
        .expect("GROCERY_TEST_DATABASE_URL must point at a scratch database");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub async fn vendor(pool: &PgPool) -> AuthUser {
    let account_id = sqlx::query_scalar(
        r#"
        INSERT INTO accounts (role, email, password_hash, name, business_name)
        VALUES ('vendor', $1, 'x', 'Test Vendor', 'Test Grocers')
        RETURNING id
        "#,
    )
    .bind(format!("vendor-{}@example.com", Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("insert vendor");

    AuthUser {
        account_id,
        role: ActorRole::Vendor,
    }
}

pub async fn purchase_order(pool: &PgPool, vendor_id: Uuid, po_status: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO purchase_orders (vendor_id, po_status) VALUES ($1, $2) RETURNING id",
    )
    .bind(vendor_id)
    .bind(po_status)
    .fetch_one(pool)
    .await
    .expect("insert purchase order")
}

/// `(po_status, status)` as stored
pub async fn purchase_order_statuses(pool: &PgPool, po_id: Uuid) -> (String, String) {
    sqlx::query_as("SELECT po_status, status FROM purchase_orders WHERE id = $1")
        .bind(po_id)
        .fetch_one(pool)
        .await
        .expect("read purchase order")
}

pub async fn set_delivery_status(pool: &PgPool, po_id: Uuid, status: &str) {
    sqlx::query("UPDATE purchase_orders SET status = $2 WHERE id = $1")
        .bind(po_id)
        .bind(status)
        .execute(pool)
        .await
        .expect("set delivery status");
}

/// Make every UPDATE of one purchase order fail until the returned trigger is dropped
pub async fn block_purchase_order_updates(pool: &PgPool, po_id: Uuid) -> String {
    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION grocery_test_block_update() RETURNS trigger AS $$
        BEGIN
            RAISE EXCEPTION 'purchase order % is locked for this test', OLD.id;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(pool)
    .await
    .expect("create blocking function");

    let trigger = format!("grocery_test_block_{}", po_id.simple());
    sqlx::query(&format!(
        r#"
        CREATE TRIGGER {trigger}
        BEFORE UPDATE ON purchase_orders
        FOR EACH ROW WHEN (OLD.id = '{po_id}')
        EXECUTE FUNCTION grocery_test_block_update()
        "#
    ))
    .execute(pool)
    .await
    .expect("create blocking trigger");
    trigger
}

pub async fn drop_trigger(pool: &PgPool, trigger: &str) {
    sqlx::query(&format!("DROP TRIGGER IF EXISTS {} ON purchase_orders", trigger))
        .execute(pool)
        .await
        .expect("drop trigger");
}
