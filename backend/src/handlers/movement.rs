//! HTTP handlers for stock movement endpoints

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{roles, StockMovement};
use crate::services::movement::{AdjustmentInput, MovementCsvRecord, MovementQuery, MovementService};
use crate::services::ReportService;
use crate::AppState;

/// List movements as JSON, or as a CSV download with `format=csv`
pub async fn list_movements(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Response> {
    let as_csv = query.wants_csv();
    let filter = query.into_filter()?;

    let service = MovementService::new(state.db);
    let movements = service.list(&filter).await?;

    if !as_csv {
        return Ok(Json(movements).into_response());
    }

    let records: Vec<MovementCsvRecord> = movements.iter().map(MovementCsvRecord::from).collect();
    let body = ReportService::export_to_csv(&records)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"movimientos.csv\""),
        ],
        body,
    )
        .into_response())
}

/// Record a manual stock adjustment
pub async fn create_adjustment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<AdjustmentInput>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    require_role(&user, &[roles::ADMIN])?;
    let service = MovementService::new(state.db);
    let movement = service.adjust(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}
