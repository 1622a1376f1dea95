//! Customer order service
//!
//! Orders carry two status columns. `status` holds the fulfilment vocabulary
//! and accepts any member of it; `lifecycle_status` holds the role-keyed
//! vocabulary and is driven by the lifecycle table in `shared::status`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::notification::{NewNotification, NotificationService};
use crate::services::status_write::{resolve_cas_miss, stored_status, StatusChange, StatusTable};
use shared::{
    calculate_order_total, check_transition, status_change_message, validate_order_items,
    ActorRole, CreateOrderInput, DocumentKind, NotificationKind, Order, OrderItem,
    OrderLifecycleStatus, OrderStatus, PaginatedResponse, Pagination, PaginationMeta,
    StatusVocabulary,
};

/// Order service for placing and progressing customer orders
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    notifications: NotificationService,
}

/// Database row for an order
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub status: String,
    pub lifecycle_status: String,
    pub total_amount: Decimal,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for an order item
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

/// Product snapshot locked while an order is placed
#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: Uuid,
    name: String,
    price: Decimal,
    stock_quantity: i32,
}

/// Which of the two order status columns a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderStatusColumn {
    Fulfilment,
    Lifecycle,
}

impl OrderStatusColumn {
    fn kind(self) -> DocumentKind {
        match self {
            OrderStatusColumn::Fulfilment => DocumentKind::Order,
            OrderStatusColumn::Lifecycle => DocumentKind::OrderLifecycle,
        }
    }

    fn current(self, row: &OrderRow) -> &str {
        match self {
            OrderStatusColumn::Fulfilment => &row.status,
            OrderStatusColumn::Lifecycle => &row.lifecycle_status,
        }
    }

    fn update_sql(self) -> &'static str {
        match self {
            OrderStatusColumn::Fulfilment => {
                r#"
                UPDATE orders SET status = $2, updated_at = NOW()
                WHERE id = $1 AND status = $3
                RETURNING id, customer_id, vendor_id, status, lifecycle_status, total_amount,
                          delivery_address, notes, created_at, updated_at
                "#
            }
            OrderStatusColumn::Lifecycle => {
                r#"
                UPDATE orders SET lifecycle_status = $2, updated_at = NOW()
                WHERE id = $1 AND lifecycle_status = $3
                RETURNING id, customer_id, vendor_id, status, lifecycle_status, total_amount,
                          delivery_address, notes, created_at, updated_at
                "#
            }
        }
    }
}

/// Whether `user` may read `order`
fn can_view_order(user: &AuthUser, customer_id: Uuid, vendor_id: Uuid) -> bool {
    match user.role {
        ActorRole::Admin | ActorRole::Delivery => true,
        ActorRole::Customer => user.account_id == customer_id,
        ActorRole::Vendor => user.account_id == vendor_id,
    }
}

/// Whether `user` may write `column` on an order
fn can_write_status(user: &AuthUser, row: &OrderRow, column: OrderStatusColumn) -> bool {
    match (column, user.role) {
        (_, ActorRole::Admin) => true,
        (_, ActorRole::Vendor) => user.account_id == row.vendor_id,
        // Customers and couriers only act through the lifecycle table
        (OrderStatusColumn::Lifecycle, ActorRole::Customer) => user.account_id == row.customer_id,
        (OrderStatusColumn::Lifecycle, ActorRole::Delivery) => true,
        (OrderStatusColumn::Fulfilment, _) => false,
    }
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(db.clone()),
            db,
        }
    }

    /// Place an order with one vendor. Prices are captured and stock is
    /// reserved inside a single transaction.
    pub async fn create_order(&self, customer_id: Uuid, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;
        validate_order_items(&input.items).map_err(|m| AppError::validation("items", m))?;

        let product_ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();

        let mut tx = self.db.begin().await?;

        let stock: HashMap<Uuid, StockRow> = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, name, price, stock_quantity
            FROM products
            WHERE id = ANY($1) AND vendor_id = $2 AND is_active = true
            FOR UPDATE
            "#,
        )
        .bind(&product_ids)
        .bind(input.vendor_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| (row.id, row))
        .collect();

        let mut items = Vec::with_capacity(input.items.len());
        for requested in &input.items {
            let product = stock
                .get(&requested.product_id)
                .ok_or_else(|| AppError::NotFound(format!("Product {}", requested.product_id)))?;

            if product.stock_quantity < requested.quantity {
                return Err(AppError::Validation {
                    field: "items".to_string(),
                    message: format!(
                        "Only {} of '{}' left in stock",
                        product.stock_quantity, product.name
                    ),
                });
            }

            items.push(OrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: requested.quantity,
                unit_price: product.price,
            });
        }

        let total_amount = calculate_order_total(&items);

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (customer_id, vendor_id, status, lifecycle_status, total_amount,
                                delivery_address, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, customer_id, vendor_id, status, lifecycle_status, total_amount,
                      delivery_address, notes, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(input.vendor_id)
        .bind(OrderStatus::Received.as_str())
        .bind(OrderLifecycleStatus::Pending.as_str())
        .bind(total_amount)
        .bind(&input.delivery_address)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(order_id = %row.id, %customer_id, total = %total_amount, "Order placed");

        self.notifications
            .notify_quietly(NewNotification {
                recipient_id: row.vendor_id,
                kind: NotificationKind::OrderStatus,
                title: "New order".to_string(),
                message: format!("A new order totalling {} was placed", total_amount),
                entity_type: Some("order"),
                entity_id: Some(row.id),
            })
            .await;

        build_order(row, items)
    }

    /// List orders visible to the caller
    pub async fn list_orders(
        &self,
        user: &AuthUser,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        // NULL filters mean "all orders" for admin and delivery accounts
        let (customer_id, vendor_id) = match user.role {
            ActorRole::Customer => (Some(user.account_id), None),
            ActorRole::Vendor => (None, Some(user.account_id)),
            ActorRole::Admin | ActorRole::Delivery => (None, None),
        };

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR vendor_id = $2)
            "#,
        )
        .bind(customer_id)
        .bind(vendor_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, vendor_id, status, lifecycle_status, total_amount,
                   delivery_address, notes, created_at, updated_at
            FROM orders
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR vendor_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(customer_id)
        .bind(vendor_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let orders = self.attach_items(rows).await?;

        Ok(PaginatedResponse {
            data: orders,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Get an order visible to the caller
    pub async fn get_order(&self, user: &AuthUser, order_id: Uuid) -> AppResult<Order> {
        let row = self.fetch_row(order_id).await?;
        if !can_view_order(user, row.customer_id, row.vendor_id) {
            // Hide the existence of other people's orders
            return Err(AppError::NotFound("Order".to_string()));
        }
        self.attach_items(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Set the fulfilment status (`Received/Processed/Dispatched/Delivered`)
    pub async fn update_status(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        requested: &str,
    ) -> AppResult<StatusChange<Order>> {
        self.write_status(user, order_id, requested, OrderStatusColumn::Fulfilment)
            .await
    }

    /// Move the order through the role-keyed lifecycle
    pub async fn update_lifecycle_status(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        requested: &str,
    ) -> AppResult<StatusChange<Order>> {
        self.write_status(user, order_id, requested, OrderStatusColumn::Lifecycle)
            .await
    }

    async fn write_status(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        requested: &str,
        column: OrderStatusColumn,
    ) -> AppResult<StatusChange<Order>> {
        let kind = column.kind();

        // Unknown values are rejected before the store is touched
        match column {
            OrderStatusColumn::Fulfilment => OrderStatus::parse(requested).map(|_| ())?,
            OrderStatusColumn::Lifecycle => OrderLifecycleStatus::parse(requested).map(|_| ())?,
        }

        let current = self.fetch_row(order_id).await?;
        if !can_view_order(user, current.customer_id, current.vendor_id) {
            return Err(AppError::NotFound("Order".to_string()));
        }
        if !can_write_status(user, &current, column) {
            return Err(AppError::Forbidden(format!(
                "Role '{}' cannot change this order's status",
                user.role
            )));
        }

        let previous_status = column.current(&current).to_string();
        check_transition(kind, &previous_status, requested, user.role)?;

        let row = sqlx::query_as::<_, OrderRow>(column.update_sql())
            .bind(order_id)
            .bind(requested)
            .bind(&previous_status)
            .fetch_optional(&self.db)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Err(resolve_cas_miss(&self.db, StatusTable::Orders, order_id).await),
        };

        tracing::info!(
            %order_id,
            kind = kind.as_str(),
            from = %previous_status,
            to = requested,
            role = %user.role,
            "Order status updated"
        );

        if previous_status != requested {
            self.notifications
                .notify_quietly(NewNotification {
                    recipient_id: row.customer_id,
                    kind: NotificationKind::OrderStatus,
                    title: "Order update".to_string(),
                    message: status_change_message("Order", &previous_status, requested),
                    entity_type: Some("order"),
                    entity_id: Some(order_id),
                })
                .await;
        }

        let order = self
            .attach_items(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        Ok(StatusChange {
            entity: order,
            previous_status,
        })
    }

    pub(crate) async fn fetch_row(&self, order_id: Uuid) -> AppResult<OrderRow> {
        sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, vendor_id, status, lifecycle_status, total_amount,
                   delivery_address, notes, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Load the items of `rows` in one query and assemble full orders
    async fn attach_items(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY product_name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem {
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                });
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                build_order(row, items)
            })
            .collect()
    }
}

fn build_order(row: OrderRow, items: Vec<OrderItem>) -> AppResult<Order> {
    Ok(Order {
        id: row.id,
        customer_id: row.customer_id,
        vendor_id: row.vendor_id,
        status: stored_status(&row.status)?,
        lifecycle_status: stored_status(&row.lifecycle_status)?,
        total_amount: row.total_amount,
        delivery_address: row.delivery_address,
        notes: row.notes,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(customer_id: Uuid, vendor_id: Uuid) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            customer_id,
            vendor_id,
            status: "Received".to_string(),
            lifecycle_status: "pending".to_string(),
            total_amount: Decimal::new(1250, 2),
            delivery_address: "1 Market Street".to_string(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(role: ActorRole) -> AuthUser {
        AuthUser {
            account_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_order_visibility() {
        let customer = user(ActorRole::Customer);
        let vendor = user(ActorRole::Vendor);
        let order = row(customer.account_id, vendor.account_id);

        assert!(can_view_order(&customer, order.customer_id, order.vendor_id));
        assert!(can_view_order(&vendor, order.customer_id, order.vendor_id));
        assert!(can_view_order(&user(ActorRole::Delivery), order.customer_id, order.vendor_id));
        assert!(!can_view_order(&user(ActorRole::Customer), order.customer_id, order.vendor_id));
    }

    #[test]
    fn test_fulfilment_writes_are_vendor_or_admin() {
        let customer = user(ActorRole::Customer);
        let vendor = user(ActorRole::Vendor);
        let order = row(customer.account_id, vendor.account_id);

        assert!(can_write_status(&vendor, &order, OrderStatusColumn::Fulfilment));
        assert!(can_write_status(&user(ActorRole::Admin), &order, OrderStatusColumn::Fulfilment));
        assert!(!can_write_status(&customer, &order, OrderStatusColumn::Fulfilment));
        assert!(!can_write_status(&user(ActorRole::Delivery), &order, OrderStatusColumn::Fulfilment));
    }

    #[test]
    fn test_lifecycle_writes_include_customer_and_courier() {
        let customer = user(ActorRole::Customer);
        let vendor = user(ActorRole::Vendor);
        let order = row(customer.account_id, vendor.account_id);

        assert!(can_write_status(&customer, &order, OrderStatusColumn::Lifecycle));
        assert!(can_write_status(&user(ActorRole::Delivery), &order, OrderStatusColumn::Lifecycle));
        assert!(!can_write_status(&user(ActorRole::Vendor), &order, OrderStatusColumn::Lifecycle));
    }

    #[test]
    fn test_build_order_rejects_unknown_stored_status() {
        let mut bad = row(Uuid::new_v4(), Uuid::new_v4());
        bad.status = "Shipped".to_string();
        assert!(matches!(build_order(bad, Vec::new()), Err(AppError::Internal(_))));
    }
}
