//! Database-backed status write tests
//!
//! These run against a scratch PostgreSQL database named by
//! `GROCERY_TEST_DATABASE_URL` and are ignored by default:
//!
//! ```text
//! GROCERY_TEST_DATABASE_URL=postgres://localhost/grocery_test cargo test -- --ignored
//! ```

use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

async fn pool() -> PgPool {
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

async fn vendor(pool: &PgPool) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO accounts (role, email, password_hash, name, business_name)
        VALUES ('vendor', $1, 'x', 'Test Vendor', 'Test Grocers')
        RETURNING id
        "#,
    )
    .bind(format!("vendor-{}@example.com", Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("insert vendor")
}

async fn purchase_order(pool: &PgPool, vendor_id: Uuid, po_status: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO purchase_orders (vendor_id, po_status) VALUES ($1, $2) RETURNING id",
    )
    .bind(vendor_id)
    .bind(po_status)
    .fetch_one(pool)
    .await
    .expect("insert purchase order")
}

/// The conditional write used for every status column
async fn swap_po_status(pool: &PgPool, po_id: Uuid, expected: &str, next: &str) -> bool {
    sqlx::query_scalar::<_, Uuid>(
        "UPDATE purchase_orders SET po_status = $2 WHERE id = $1 AND po_status = $3 RETURNING id",
    )
    .bind(po_id)
    .bind(next)
    .bind(expected)
    .fetch_optional(pool)
    .await
    .expect("conditional update")
    .is_some()
}

#[tokio::test]
#[ignore]
async fn test_stale_expected_status_does_not_write() {
    let pool = pool().await;
    let po_id = purchase_order(&pool, vendor(&pool).await, "Draft").await;

    assert!(swap_po_status(&pool, po_id, "Draft", "Approved").await);
    // A second writer that read "Draft" earlier loses
    assert!(!swap_po_status(&pool, po_id, "Draft", "Cancelled").await);

    let stored: String = sqlx::query_scalar("SELECT po_status FROM purchase_orders WHERE id = $1")
        .bind(po_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "Approved");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_writers_only_one_wins() {
    let pool = pool().await;
    let po_id = purchase_order(&pool, vendor(&pool).await, "Draft").await;

    let (a, b) = tokio::join!(
        swap_po_status(&pool, po_id, "Draft", "Approved"),
        swap_po_status(&pool, po_id, "Draft", "Cancelled"),
    );
    assert!(a ^ b);
}

#[tokio::test]
#[ignore]
async fn test_schema_rejects_unknown_status() {
    let pool = pool().await;
    let vendor_id = vendor(&pool).await;

    let result = sqlx::query("INSERT INTO purchase_orders (vendor_id, po_status) VALUES ($1, 'Shipped')")
        .bind(vendor_id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore]
async fn test_grn_requires_existing_purchase_order() {
    let pool = pool().await;
    let vendor_id = vendor(&pool).await;

    let result = sqlx::query(
        "INSERT INTO goods_receipt_notes (po_id, status, received_by) VALUES ($1, 'Received', $2)",
    )
    .bind(Uuid::new_v4())
    .bind(vendor_id)
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
