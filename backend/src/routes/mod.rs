//! Route definitions for the grocery platform API

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/orders", order_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/grns", grn_routes())
        .nest("/return-orders", return_order_routes())
        .nest("/notifications", notification_routes())
        .nest("/files", file_routes(state.config.storage.request_body_limit()))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public apart from logout and me)
        .nest("/auth", auth_routes(state.clone()))
        // Catalogue: browsing is public, changes need a token
        .nest("/products", product_routes(state))
        // Status vocabularies (public)
        .route("/statuses/:kind", get(handlers::list_statuses))
        .merge(protected)
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let auth = middleware::from_fn_with_state(state, auth_middleware);

    Router::new()
        .route("/vendor/register", post(handlers::register_vendor))
        .route("/vendor/login", post(handlers::login_vendor))
        .route("/customer/register", post(handlers::register_customer))
        .route("/customer/login", post(handlers::login_customer))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout).route_layer(auth.clone()))
        .route("/me", get(handlers::me).route_layer(auth))
}

/// Product routes; only the write methods are authenticated
fn product_routes(state: AppState) -> Router<AppState> {
    let auth = middleware::from_fn_with_state(state, auth_middleware);

    Router::new()
        .route(
            "/",
            get(handlers::list_products)
                .merge(post(handlers::create_product).route_layer(auth.clone())),
        )
        .route(
            "/:product_id",
            get(handlers::get_product).merge(
                put(handlers::update_product)
                    .delete(handlers::delete_product)
                    .route_layer(auth),
            ),
        )
}

/// Order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/status", patch(handlers::update_order_status))
        .route("/:order_id/lifecycle", patch(handlers::update_order_lifecycle))
}

/// Purchase order routes (protected)
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:po_id",
            get(handlers::get_purchase_order)
                .patch(handlers::update_purchase_order)
                .delete(handlers::delete_purchase_order),
        )
}

/// GRN routes (protected)
fn grn_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_grns).post(handlers::create_grn))
        .route("/:grn_id", get(handlers::get_grn))
        .route("/:grn_id/status", patch(handlers::update_grn_status))
}

/// Return order routes (protected)
fn return_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_return_orders).post(handlers::create_return_order),
        )
        .route("/:return_id", get(handlers::get_return_order))
        .route(
            "/:return_id/status",
            patch(handlers::update_return_order_status),
        )
}

/// Notification routes (protected)
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/unread-count", get(handlers::get_unread_count))
        .route("/mark-all-read", post(handlers::mark_all_notifications_read))
        .route("/:notification_id/read", post(handlers::mark_notification_read))
}

/// File routes (protected); uploads may be larger than axum's default body limit
fn file_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_files).post(handlers::upload_file))
        .route("/:file_id", delete(handlers::delete_file))
        .layer(DefaultBodyLimit::max(body_limit))
}
