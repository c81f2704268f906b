//! Route definitions for the Inventory Management API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/pedidos", purchase_order_routes())
        .nest("/salidas", sale_routes())
        .nest("/movimientos", movement_routes())
        .nest("/productos", product_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Pedido routes
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_purchase_order).patch(handlers::update_purchase_order),
        )
}

/// Salida routes
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/report", get(handlers::sales_report))
        .route("/:sale_id", get(handlers::get_sale).patch(handlers::update_sale))
}

/// Stock movement routes
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route("/ajustes", post(handlers::create_adjustment))
}

/// Product routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products))
        .route("/bajo-stock", get(handlers::list_low_stock))
        .route("/:product_id", get(handlers::get_product))
}
