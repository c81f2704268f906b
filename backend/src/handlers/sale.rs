//! HTTP handlers for salida endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{roles, Sale};
use crate::services::sale::{CreateSaleInput, SaleFilter, SaleService, UpdateSaleInput};
use crate::AppState;

const WRITERS: &[&str] = &[roles::ADMIN, roles::SELLER];

fn service(state: AppState) -> SaleService {
    SaleService::new(state.db, state.notifier)
}

/// Register a sale
pub async fn create_sale(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    require_role(&user, WRITERS)?;
    let sale = service(state).create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// List sales
pub async fn list_sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<Vec<Sale>>> {
    let sales = service(state).list(filter).await?;
    Ok(Json(sales))
}

/// Get a sale by id
pub async fn get_sale(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Sale>> {
    let sale = service(state).get(sale_id).await?;
    Ok(Json(sale))
}

/// Update a sale's state or delivery date
pub async fn update_sale(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<Sale>> {
    require_role(&user, WRITERS)?;
    let sale = service(state).update(sale_id, input).await?;
    Ok(Json(sale))
}
