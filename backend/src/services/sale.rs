//! Sale (salida) service
//!
//! A sale locks every product it touches, checks stock for all lines, then
//! writes the header, the lines and one `salida` movement per line in a
//! single transaction. Admins are notified once the sale has committed.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::types::{parse_query_date, DateRange};
use shared::validation::match_active_state;

use crate::error::{AppError, AppResult};
use crate::models::{
    active_state_names, check_sale_lines, format_ticket, lock_order, pick_default_state, plan_sale, sale_observation,
    LineRequest, MovementPurpose, PaymentType, Sale, SaleChannel, SaleLine, SaleLineRow, SaleRow,
    StatusOption, StatusRow,
};
use crate::services::ledger::{self, MovementEntry};
use crate::services::NotificationService;

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    notifier: NotificationService,
}

/// One requested line of a new sale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub cantidad: i32,
    pub precio_unitario: Option<Decimal>,
}

/// Input for registering a sale
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleInput {
    #[validate(length(min = 1, message = "tipoSalida is required"))]
    pub tipo_salida: String,
    #[validate(length(min = 1, message = "tipoVenta is required"))]
    pub tipo_venta: String,
    pub fecha_entrega: Option<NaiveDate>,
    pub estado: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "A sale must contain at least one product"))]
    pub productos: Vec<SaleLineInput>,
}

/// Input for updating a sale; lines are never changed
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleInput {
    pub estado: Option<String>,
    pub fecha_entrega: Option<NaiveDate>,
}

/// Query string filters for listing sales
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFilter {
    pub estado: Option<String>,
    pub tipo_salida: Option<String>,
    pub vendedor_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

const SALE_VIEW: &str = r#"
    SELECT s.id, s.ticket, s.vendedor_id, u.nombre AS vendedor_nombre, s.tipo_salida,
           s.tipo_venta, s.estado, s.fecha_entrega, s.total, s.created_at
    FROM salidas_alm s
    LEFT JOIN usuarios u ON u.id = s.vendedor_id
"#;

impl SaleService {
    /// Create a new SaleService instance
    pub fn new(db: PgPool, notifier: NotificationService) -> Self {
        Self { db, notifier }
    }

    /// Register a sale and take its lines out of stock
    pub async fn create(&self, seller_id: Uuid, input: CreateSaleInput) -> AppResult<Sale> {
        input.validate()?;

        let channel = SaleChannel::parse(&input.tipo_salida)
            .ok_or_else(|| AppError::field("tipoSalida", "tipoSalida must be 'tienda' or 'ruta'"))?;
        let payment_type = PaymentType::parse(&input.tipo_venta)
            .ok_or_else(|| AppError::field("tipoVenta", "tipoVenta must be 'contado' or 'credito'"))?;

        let lines: Vec<LineRequest> = input
            .productos
            .iter()
            .map(|l| LineRequest {
                product_id: l.product_id,
                quantity: l.cantidad,
                unit_price: l.precio_unitario,
            })
            .collect();
        check_sale_lines(&lines)?;

        let mut tx = self.db.begin().await?;

        let states = load_states(&mut tx).await?;
        let estado = resolve_state(&states, input.estado.as_deref())?;

        let products = ledger::lock_products(&mut tx, &lock_order(&lines)).await?;
        let plan = plan_sale(channel, &lines, &products)?;

        let ticket = format_ticket(Utc::now(), Uuid::new_v4().as_u128() as u32);

        let header = sqlx::query_as::<_, SaleRow>(
            r#"
            WITH inserted AS (
                INSERT INTO salidas_alm (ticket, vendedor_id, tipo_salida, tipo_venta, estado, fecha_entrega, total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT i.id, i.ticket, i.vendedor_id, u.nombre AS vendedor_nombre, i.tipo_salida,
                   i.tipo_venta, i.estado, i.fecha_entrega, i.total, i.created_at
            FROM inserted i
            LEFT JOIN usuarios u ON u.id = i.vendedor_id
            "#,
        )
        .bind(&ticket)
        .bind(seller_id)
        .bind(channel.as_str())
        .bind(payment_type.as_str())
        .bind(&estado)
        .bind(input.fecha_entrega)
        .bind(plan.total)
        .fetch_one(&mut *tx)
        .await?;
        let sale_id = header.id;

        let mut written = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let row = sqlx::query_as::<_, SaleLineRow>(
                r#"
                WITH inserted AS (
                    INSERT INTO detalle_salidas (salida_id, producto_id, cantidad, precio_unitario, subtotal)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                )
                SELECT i.id, i.salida_id, i.producto_id, p.nombre AS producto_nombre,
                       i.cantidad, i.precio_unitario, i.subtotal
                FROM inserted i
                JOIN productos p ON p.id = i.producto_id
                "#,
            )
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .fetch_one(&mut *tx)
            .await?;
            written.push(row);

            let entry = MovementEntry::new(MovementPurpose::Venta, seller_id, sale_observation(&ticket))
                .for_salida(sale_id);
            ledger::record_change(&mut tx, line.product_id, line.change, entry).await?;
        }

        let sale = registered_sale(header, written)?;

        tx.commit().await?;

        tracing::info!(
            sale_id = %sale_id,
            ticket = %ticket,
            lines = plan.lines.len(),
            total = %plan.total,
            "Sale registered"
        );

        self.notifier.notify_sale(&sale);
        Ok(sale)
    }

    /// Change the state or delivery date of a sale
    pub async fn update(&self, sale_id: Uuid, input: UpdateSaleInput) -> AppResult<Sale> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>("SELECT estado FROM salidas_alm WHERE id = $1 FOR UPDATE")
            .bind(sale_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Salida"))?;

        let estado = match input.estado.as_deref() {
            Some(requested) => {
                let states = load_states(&mut tx).await?;
                resolve_state(&states, Some(requested))?
            }
            None => current,
        };

        sqlx::query(
            r#"
            UPDATE salidas_alm
            SET estado = $2, fecha_entrega = COALESCE($3, fecha_entrega), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sale_id)
        .bind(&estado)
        .bind(input.fecha_entrega)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(sale_id = %sale_id, estado = %estado, "Sale updated");

        self.get(sale_id).await
    }

    /// Get a sale with its lines
    pub async fn get(&self, sale_id: Uuid) -> AppResult<Sale> {
        let row = sqlx::query_as::<_, SaleRow>(&format!("{} WHERE s.id = $1", SALE_VIEW))
            .bind(sale_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Salida"))?;

        let mut lines = self.lines_for(&[sale_id]).await?;
        row.into_sale(lines.remove(&sale_id).unwrap_or_default())
    }

    /// List sales, newest first
    pub async fn list(&self, filter: SaleFilter) -> AppResult<Vec<Sale>> {
        let channel = match filter.tipo_salida.as_deref() {
            Some(value) => Some(
                SaleChannel::parse(value)
                    .ok_or_else(|| AppError::field("tipoSalida", "tipoSalida must be 'tienda' or 'ruta'"))?,
            ),
            None => None,
        };
        let from = parse_optional_date("from", filter.from.as_deref())?;
        let to = parse_optional_date("to", filter.to.as_deref())?;
        if let (Some(start), Some(end)) = (from, to) {
            DateRange::new(start, end).map_err(|m| AppError::field("from", m))?;
        }
        let estado = filter.estado.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR LOWER(s.estado) = LOWER($1))
              AND ($2::text IS NULL OR s.tipo_salida = $2)
              AND ($3::uuid IS NULL OR s.vendedor_id = $3)
              AND ($4::date IS NULL OR s.created_at::date >= $4)
              AND ($5::date IS NULL OR s.created_at::date <= $5)
            ORDER BY s.created_at DESC
            "#,
            SALE_VIEW
        ))
        .bind(estado)
        .bind(channel.map(|c| c.as_str()))
        .bind(filter.vendedor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.lines_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let detalles = lines.remove(&row.id).unwrap_or_default();
                row.into_sale(detalles)
            })
            .collect()
    }

    async fn lines_for(&self, sale_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<SaleLine>>> {
        if sale_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT d.id, d.salida_id, d.producto_id, p.nombre AS producto_nombre,
                   d.cantidad, d.precio_unitario, d.subtotal
            FROM detalle_salidas d
            JOIN productos p ON p.id = d.producto_id
            WHERE d.salida_id = ANY($1)
            ORDER BY p.nombre
            "#,
        )
        .bind(sale_ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SaleLine>> = HashMap::new();
        for row in rows {
            grouped.entry(row.salida_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

/// The sale as written, lines in the same order reads return them
fn registered_sale(header: SaleRow, mut lines: Vec<SaleLineRow>) -> AppResult<Sale> {
    lines.sort_by(|a, b| a.producto_nombre.cmp(&b.producto_nombre));
    header.into_sale(lines.into_iter().map(SaleLine::from).collect())
}

async fn load_states(conn: &mut PgConnection) -> AppResult<Vec<StatusOption>> {
    let rows = sqlx::query_as::<_, StatusRow>(
        "SELECT id, nombre, activo, es_default FROM estados_salida ORDER BY orden, nombre",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(StatusOption::from).collect())
}

/// Canonical name of the requested salida state, or the default one
fn resolve_state(states: &[StatusOption], requested: Option<&str>) -> AppResult<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            let active = active_state_names(states);
            match_active_state(name, &active)
                .map(str::to_string)
                .ok_or_else(|| AppError::field("estado", format!("State '{}' is not an active salida state", name)))
        }
        None => pick_default_state(states)
            .map(|s| s.name.clone())
            .ok_or_else(|| AppError::validation("No active default salida state is configured")),
    }
}

fn parse_optional_date(field: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_query_date(v)
            .map(Some)
            .ok_or_else(|| AppError::field(field, format!("'{}' is not a valid YYYY-MM-DD date", v))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> Vec<StatusOption> {
        ["Pendiente", "Entregado", "Archivado"]
            .iter()
            .enumerate()
            .map(|(i, name)| StatusOption {
                id: Uuid::new_v4(),
                name: name.to_string(),
                active: *name != "Archivado",
                es_default: i == 0,
            })
            .collect()
    }

    #[test]
    fn test_resolve_state_defaults() {
        assert_eq!(resolve_state(&states(), None).unwrap(), "Pendiente");
        assert_eq!(resolve_state(&states(), Some("  ")).unwrap(), "Pendiente");
    }

    #[test]
    fn test_resolve_state_uses_configured_spelling() {
        assert_eq!(resolve_state(&states(), Some("entregado")).unwrap(), "Entregado");
    }

    #[test]
    fn test_resolve_state_rejects_inactive() {
        match resolve_state(&states(), Some("Archivado")) {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "estado"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date("from", None).unwrap(), None);
        assert!(parse_optional_date("from", Some("2024-02-30")).is_err());
        assert_eq!(
            parse_optional_date("to", Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_registered_sale_uses_written_rows() {
        let sale_id = Uuid::new_v4();
        let header = SaleRow {
            id: sale_id,
            ticket: "TK-20240601090507-000100AB".into(),
            vendedor_id: Uuid::new_v4(),
            vendedor_nombre: Some("Ana".into()),
            tipo_salida: "ruta".into(),
            tipo_venta: "contado".into(),
            estado: "Pendiente".into(),
            fecha_entrega: None,
            total: Decimal::new(9050, 2),
            created_at: Utc::now(),
        };
        let line = |name: &str, qty: i32, price: i64| SaleLineRow {
            id: Uuid::new_v4(),
            salida_id: sale_id,
            producto_id: Uuid::new_v4(),
            producto_nombre: name.into(),
            cantidad: qty,
            precio_unitario: Decimal::new(price, 2),
            subtotal: Decimal::new(price * qty as i64, 2),
        };

        let sale = registered_sale(header, vec![line("Tostadora", 1, 4050), line("Plancha", 2, 2500)]).unwrap();

        assert_eq!(sale.id, sale_id);
        assert_eq!(sale.channel, SaleChannel::Ruta);
        assert_eq!(sale.seller_name.as_deref(), Some("Ana"));
        assert_eq!(sale.total, Decimal::new(9050, 2));
        let names: Vec<&str> = sale.detalles.iter().map(|d| d.product_name.as_str()).collect();
        assert_eq!(names, ["Plancha", "Tostadora"]);
        let line_sum: Decimal = sale.detalles.iter().map(|d| d.subtotal).sum();
        assert_eq!(line_sum, sale.total);
    }

    #[test]
    fn test_create_input_rejects_empty_products() {
        let input: CreateSaleInput =
            serde_json::from_str(r#"{"tipoSalida": "tienda", "tipoVenta": "contado", "productos": []}"#).unwrap();
        match AppError::from(input.validate().unwrap_err()) {
            AppError::Validation { field, .. } => assert_eq!(field, "productos"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
