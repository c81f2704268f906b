//! Stock movement queries and manual adjustments

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::types::{parse_query_date, DateRange};
use shared::validation::validate_adjustment;

use crate::error::{AppError, AppResult};
use crate::models::{MovementKind, MovementPurpose, MovementRow, StockChange, StockMovement};
use crate::services::ledger::{self, MovementEntry};

const DEFAULT_LIMIT: i64 = 200;
const MAX_LIMIT: i64 = 1000;

/// Movement service
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

/// Query string filters for listing movements
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementQuery {
    pub tipo: Option<String>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub format: Option<String>,
}

/// Parsed and validated movement filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: i64,
}

impl MovementQuery {
    pub fn wants_csv(&self) -> bool {
        self.format
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    pub fn into_filter(self) -> AppResult<MovementFilter> {
        let kind = match self.tipo.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Some(
                MovementKind::parse(t)
                    .ok_or_else(|| AppError::field("tipo", "tipo must be 'entrada', 'salida' or 'ajuste'"))?,
            ),
            None => None,
        };

        let parse = |field: &str, value: Option<&str>| -> AppResult<Option<NaiveDate>> {
            match value.map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => parse_query_date(v)
                    .map(Some)
                    .ok_or_else(|| AppError::field(field, format!("'{}' is not a valid YYYY-MM-DD date", v))),
                None => Ok(None),
            }
        };
        let from = parse("from", self.from.as_deref())?;
        let to = parse("to", self.to.as_deref())?;
        if let (Some(start), Some(end)) = (from, to) {
            DateRange::new(start, end).map_err(|m| AppError::field("from", m))?;
        }

        Ok(MovementFilter {
            kind,
            product_id: self.product_id,
            user_id: self.user_id,
            from,
            to,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        })
    }
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentInput {
    pub product_id: Uuid,
    /// Signed units, positive adds and negative removes
    pub cantidad: i32,
    #[validate(length(max = 500, message = "observacion must be at most 500 characters"))]
    pub observacion: Option<String>,
}

/// Flat movement record for CSV export
#[derive(Debug, Serialize)]
pub struct MovementCsvRecord {
    pub fecha: String,
    pub producto: String,
    pub tipo: &'static str,
    pub motivo: &'static str,
    pub cantidad: i32,
    pub stock_anterior: i32,
    pub stock_nuevo: i32,
    pub usuario_id: String,
    pub observacion: String,
}

impl From<&StockMovement> for MovementCsvRecord {
    fn from(m: &StockMovement) -> Self {
        Self {
            fecha: m.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            producto: m.product_name.clone().unwrap_or_else(|| m.product_id.to_string()),
            tipo: m.kind.as_str(),
            motivo: m.purpose.as_str(),
            cantidad: m.quantity,
            stock_anterior: m.stock_anterior,
            stock_nuevo: m.stock_nuevo,
            usuario_id: m.user_id.map(|u| u.to_string()).unwrap_or_default(),
            observacion: m.observation.clone().unwrap_or_default(),
        }
    }
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List movements matching the filter, newest first
    pub async fn list(&self, filter: &MovementFilter) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT m.id, m.producto_id, p.nombre AS producto_nombre, m.tipo, m.motivo, m.cantidad,
                   m.stock_anterior, m.stock_nuevo, m.usuario_id, m.observacion, m.pedido_id,
                   m.salida_id, m.created_at
            FROM movimientos_inv m
            JOIN productos p ON p.id = m.producto_id
            WHERE ($1::text IS NULL OR m.tipo = $1)
              AND ($2::uuid IS NULL OR m.producto_id = $2)
              AND ($3::uuid IS NULL OR m.usuario_id = $3)
              AND ($4::date IS NULL OR m.created_at::date >= $4)
              AND ($5::date IS NULL OR m.created_at::date <= $5)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $6
            "#,
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.product_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }

    /// Correct a product's stock by a signed amount
    pub async fn adjust(&self, user_id: Uuid, input: AdjustmentInput) -> AppResult<StockMovement> {
        input.validate()?;
        validate_adjustment(input.cantidad).map_err(|m| AppError::field("cantidad", m))?;

        let mut tx = self.db.begin().await?;

        let product = ledger::lock_product(&mut tx, input.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Producto"))?;

        let change = StockChange::adjust(product.stock_actual, input.cantidad, product.stock_maximo)?;

        let observation = input
            .observacion
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "Ajuste manual".to_string());

        let entry = MovementEntry::new(MovementPurpose::AjusteManual, user_id, observation);
        let movement = ledger::record_change(&mut tx, product.id, change, entry).await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product.id,
            delta = input.cantidad,
            stock = change.new,
            "Manual stock adjustment"
        );

        Ok(movement)
    }
}
