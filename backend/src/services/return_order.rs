//! Return order service

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::notification::{NewNotification, NotificationService};
use crate::services::order::OrderService;
use crate::services::status_write::{resolve_cas_miss, stored_status, StatusChange, StatusTable};
use shared::{
    check_transition, status_change_message, ActorRole, CreateReturnOrderInput, DocumentKind,
    NotificationKind, OrderLifecycleStatus, OrderStatus, PaginatedResponse, Pagination,
    PaginationMeta, ReturnOrder, ReturnOrderStatus, StatusVocabulary,
};

/// Return order service
#[derive(Clone)]
pub struct ReturnOrderService {
    db: PgPool,
    orders: OrderService,
    notifications: NotificationService,
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnOrderRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    reason: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    customer_id: Uuid,
    vendor_id: Uuid,
}

impl ReturnOrderRow {
    fn to_return_order(&self) -> AppResult<ReturnOrder> {
        Ok(ReturnOrder {
            id: self.id,
            order_id: self.order_id,
            status: stored_status(&self.status)?,
            reason: self.reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Whether an order has reached the customer under either vocabulary
/// Customer and vendor filters for the returns `user` may see
fn visible_scope(user: &AuthUser) -> AppResult<(Option<Uuid>, Option<Uuid>)> {
    match user.role {
        ActorRole::Customer => Ok((Some(user.account_id), None)),
        ActorRole::Vendor => Ok((None, Some(user.account_id))),
        ActorRole::Admin => Ok((None, None)),
        ActorRole::Delivery => Err(AppError::Forbidden(
            "Delivery accounts cannot view returns".to_string(),
        )),
    }
}

fn in_scope(scope: (Option<Uuid>, Option<Uuid>), customer_id: Uuid, vendor_id: Uuid) -> bool {
    let (customer, vendor) = scope;
    customer.map_or(true, |id| id == customer_id) && vendor.map_or(true, |id| id == vendor_id)
}

fn is_delivered(status: &str, lifecycle_status: &str) -> bool {
    status == OrderStatus::Delivered.as_str()
        || lifecycle_status == OrderLifecycleStatus::Delivered.as_str()
}

impl ReturnOrderService {
    /// Create a new ReturnOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            orders: OrderService::new(db.clone()),
            notifications: NotificationService::new(db.clone()),
            db,
        }
    }

    /// Raise a return against a delivered order owned by the customer
    pub async fn create_return_order(
        &self,
        user: &AuthUser,
        input: CreateReturnOrderInput,
    ) -> AppResult<ReturnOrder> {
        user.require_any(&[ActorRole::Customer])?;
        input.validate()?;

        let order = self.orders.fetch_row(input.order_id).await?;
        if order.customer_id != user.account_id {
            return Err(AppError::NotFound("Order".to_string()));
        }
        if !is_delivered(&order.status, &order.lifecycle_status) {
            return Err(AppError::validation(
                "order_id",
                "Only delivered orders can be returned",
            ));
        }

        let row = sqlx::query_as::<_, ReturnOrderRow>(
            r#"
            WITH inserted AS (
                INSERT INTO return_orders (order_id, status, reason)
                VALUES ($1, $2, $3)
                RETURNING id, order_id, status, reason, created_at, updated_at
            )
            SELECT i.id, i.order_id, i.status, i.reason, i.created_at, i.updated_at,
                   o.customer_id, o.vendor_id
            FROM inserted i
            JOIN orders o ON o.id = i.order_id
            "#,
        )
        .bind(input.order_id)
        .bind(ReturnOrderStatus::Received.as_str())
        .bind(input.reason.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(return_id = %row.id, order_id = %row.order_id, "Return order raised");

        self.notifications
            .notify_quietly(NewNotification {
                recipient_id: row.vendor_id,
                kind: NotificationKind::ReturnStatus,
                title: "Return requested".to_string(),
                message: format!("A customer requested a return: {}", row.reason),
                entity_type: Some("return_order"),
                entity_id: Some(row.id),
            })
            .await;

        row.to_return_order()
    }

    /// List returns visible to the caller
    pub async fn list_return_orders(
        &self,
        user: &AuthUser,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ReturnOrder>> {
        let (customer_id, vendor_id) = visible_scope(user)?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM return_orders r
            JOIN orders o ON o.id = r.order_id
            WHERE ($1::uuid IS NULL OR o.customer_id = $1)
              AND ($2::uuid IS NULL OR o.vendor_id = $2)
            "#,
        )
        .bind(customer_id)
        .bind(vendor_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ReturnOrderRow>(
            r#"
            SELECT r.id, r.order_id, r.status, r.reason, r.created_at, r.updated_at,
                   o.customer_id, o.vendor_id
            FROM return_orders r
            JOIN orders o ON o.id = r.order_id
            WHERE ($1::uuid IS NULL OR o.customer_id = $1)
              AND ($2::uuid IS NULL OR o.vendor_id = $2)
            ORDER BY r.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(customer_id)
        .bind(vendor_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows
                .iter()
                .map(ReturnOrderRow::to_return_order)
                .collect::<AppResult<Vec<_>>>()?,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Get a return visible to the caller
    pub async fn get_return_order(&self, user: &AuthUser, return_id: Uuid) -> AppResult<ReturnOrder> {
        let scope = visible_scope(user)?;
        let row = self.fetch_row(return_id).await?;
        if !in_scope(scope, row.customer_id, row.vendor_id) {
            return Err(AppError::NotFound("Return order".to_string()));
        }
        row.to_return_order()
    }

    /// Move a return through its vocabulary; vendor of the order or admin only
    pub async fn update_status(
        &self,
        user: &AuthUser,
        return_id: Uuid,
        requested: &str,
    ) -> AppResult<StatusChange<ReturnOrder>> {
        ReturnOrderStatus::parse(requested)?;

        let row = self.fetch_row(return_id).await?;
        user.require_any(&[ActorRole::Vendor, ActorRole::Admin])?;
        user.require_owner(row.vendor_id)?;

        let previous: ReturnOrderStatus = stored_status(&row.status)?;
        check_transition(DocumentKind::ReturnOrder, previous.as_str(), requested, user.role)?;

        let updated = sqlx::query_as::<_, ReturnOrderRow>(
            r#"
            WITH updated AS (
                UPDATE return_orders
                SET status = $2, updated_at = NOW()
                WHERE id = $1 AND status = $3
                RETURNING id, order_id, status, reason, created_at, updated_at
            )
            SELECT u.id, u.order_id, u.status, u.reason, u.created_at, u.updated_at,
                   o.customer_id, o.vendor_id
            FROM updated u
            JOIN orders o ON o.id = u.order_id
            "#,
        )
        .bind(return_id)
        .bind(requested)
        .bind(previous.as_str())
        .fetch_optional(&self.db)
        .await?;

        let updated = match updated {
            Some(updated) => updated,
            None => {
                return Err(resolve_cas_miss(&self.db, StatusTable::ReturnOrders, return_id).await)
            }
        };

        tracing::info!(
            %return_id,
            from = previous.as_str(),
            to = requested,
            role = %user.role,
            "Return order status updated"
        );

        if previous.as_str() != requested {
            self.notifications
                .notify_quietly(NewNotification {
                    recipient_id: updated.customer_id,
                    kind: NotificationKind::ReturnStatus,
                    title: "Return update".to_string(),
                    message: status_change_message("Return", previous.as_str(), requested),
                    entity_type: Some("return_order"),
                    entity_id: Some(return_id),
                })
                .await;
        }

        Ok(StatusChange {
            entity: updated.to_return_order()?,
            previous_status: previous.as_str().to_string(),
        })
    }

    async fn fetch_row(&self, return_id: Uuid) -> AppResult<ReturnOrderRow> {
        sqlx::query_as::<_, ReturnOrderRow>(
            r#"
            SELECT r.id, r.order_id, r.status, r.reason, r.created_at, r.updated_at,
                   o.customer_id, o.vendor_id
            FROM return_orders r
            JOIN orders o ON o.id = r.order_id
            WHERE r.id = $1
            "#,
        )
        .bind(return_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return order".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_under_either_vocabulary() {
        assert!(is_delivered("Delivered", "in_transit"));
        assert!(is_delivered("Dispatched", "delivered"));
        assert!(!is_delivered("Dispatched", "in_transit"));
    }

    fn user(role: ActorRole) -> AuthUser {
        AuthUser {
            account_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_delivery_accounts_see_no_returns() {
        assert!(matches!(
            visible_scope(&user(ActorRole::Delivery)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_return_visibility_follows_order_parties() {
        let customer = user(ActorRole::Customer);
        let vendor = user(ActorRole::Vendor);
        let stranger = Uuid::new_v4();

        let scope = visible_scope(&customer).unwrap();
        assert!(in_scope(scope, customer.account_id, vendor.account_id));
        assert!(!in_scope(scope, stranger, vendor.account_id));

        let scope = visible_scope(&vendor).unwrap();
        assert!(in_scope(scope, customer.account_id, vendor.account_id));
        assert!(!in_scope(scope, customer.account_id, stranger));

        let scope = visible_scope(&user(ActorRole::Admin)).unwrap();
        assert!(in_scope(scope, stranger, stranger));
    }
}
