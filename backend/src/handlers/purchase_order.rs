//! HTTP handlers for pedido endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{roles, PurchaseOrder};
use crate::services::purchase_order::{
    CreatePurchaseOrderInput, PurchaseOrderFilter, PurchaseOrderService, UpdatePurchaseOrderInput,
};
use crate::AppState;

const WRITERS: &[&str] = &[roles::ADMIN, roles::WAREHOUSE];

/// Create a pedido
pub async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    require_role(&user, WRITERS)?;
    let service = PurchaseOrderService::new(state.db);
    let order = service.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List pedidos
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<PurchaseOrderFilter>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db);
    let orders = service.list(filter).await?;
    Ok(Json(orders))
}

/// Get a pedido by id
pub async fn get_purchase_order(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db);
    let order = service.get(order_id).await?;
    Ok(Json(order))
}

/// Update a pedido's state, quantity or dates
pub async fn update_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    require_role(&user, WRITERS)?;
    let service = PurchaseOrderService::new(state.db);
    let order = service.update(user.user_id, order_id, input).await?;
    Ok(Json(order))
}
