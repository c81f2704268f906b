//! Reporting service: sales workbook and CSV export
//!
//! The sales report is a SpreadsheetML 2003 workbook, the XML format older
//! Excel versions open directly.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use shared::types::DateRange;

use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportService {
    db: PgPool,
}

/// One sale as shown in the report
#[derive(Debug, Clone, FromRow)]
pub struct SaleReportRow {
    pub ticket: String,
    pub created_at: DateTime<Utc>,
    pub vendedor_nombre: Option<String>,
    pub tipo_salida: String,
    pub tipo_venta: String,
    pub estado: String,
    pub items: i64,
    pub total: Decimal,
}

#[derive(Debug, FromRow)]
struct RecordedRange {
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

const HEADERS: [&str; 8] = [
    "Ticket",
    "Fecha",
    "Vendedor",
    "Tipo de salida",
    "Tipo de venta",
    "Estado",
    "Artículos",
    "Total",
];

impl ReportService {
    /// Create a new ReportService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Render the sales workbook for an inclusive date range
    pub async fn sales_report(&self, range: DateRange) -> AppResult<String> {
        let recorded = sqlx::query_as::<_, RecordedRange>(
            "SELECT MIN(created_at)::date AS first, MAX(created_at)::date AS last FROM salidas_alm",
        )
        .fetch_one(&self.db)
        .await?;

        let covered = match (recorded.first, recorded.last) {
            (Some(first), Some(last)) => DateRange { start: first, end: last }.overlaps(&range),
            _ => false,
        };
        if !covered {
            return Err(AppError::validation(format!(
                "No sales recorded between {} and {}",
                range.start, range.end
            )));
        }

        let rows = sqlx::query_as::<_, SaleReportRow>(
            r#"
            SELECT s.ticket, s.created_at, u.nombre AS vendedor_nombre, s.tipo_salida, s.tipo_venta,
                   s.estado, COALESCE(SUM(d.cantidad), 0)::BIGINT AS items, s.total
            FROM salidas_alm s
            LEFT JOIN usuarios u ON u.id = s.vendedor_id
            LEFT JOIN detalle_salidas d ON d.salida_id = s.id
            WHERE s.created_at::date BETWEEN $1 AND $2
            GROUP BY s.id, u.nombre
            ORDER BY s.created_at
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        tracing::info!(start = %range.start, end = %range.end, sales = rows.len(), "Sales report generated");

        Ok(render_sales_workbook(&range, &rows))
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

/// Build the SpreadsheetML document
pub fn render_sales_workbook(range: &DateRange, rows: &[SaleReportRow]) -> String {
    let mut xml = String::with_capacity(1024 + rows.len() * 512);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<?mso-application progid=\"Excel.Sheet\"?>\n");
    xml.push_str(
        "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    );
    xml.push_str(
        " <Styles>\n  <Style ss:ID=\"header\"><Font ss:Bold=\"1\"/></Style>\n  \
         <Style ss:ID=\"money\"><NumberFormat ss:Format=\"#,##0.00\"/></Style>\n </Styles>\n",
    );
    xml.push_str(&format!(
        " <Worksheet ss:Name=\"{}\">\n  <Table>\n",
        escape_xml(&format!("Salidas {} a {}", range.start, range.end))
    ));

    xml.push_str("   <Row>\n");
    for header in HEADERS {
        xml.push_str(&string_cell(header, Some("header")));
    }
    xml.push_str("   </Row>\n");

    let mut grand_total = Decimal::ZERO;
    for row in rows {
        grand_total += row.total;
        xml.push_str("   <Row>\n");
        xml.push_str(&string_cell(&row.ticket, None));
        xml.push_str(&string_cell(&row.created_at.format("%Y-%m-%d %H:%M").to_string(), None));
        xml.push_str(&string_cell(row.vendedor_nombre.as_deref().unwrap_or(""), None));
        xml.push_str(&string_cell(&row.tipo_salida, None));
        xml.push_str(&string_cell(&row.tipo_venta, None));
        xml.push_str(&string_cell(&row.estado, None));
        xml.push_str(&number_cell(&row.items.to_string(), None));
        xml.push_str(&number_cell(&row.total.to_string(), Some("money")));
        xml.push_str("   </Row>\n");
    }

    xml.push_str("   <Row>\n");
    xml.push_str("    <Cell ss:Index=\"7\" ss:StyleID=\"header\"><Data ss:Type=\"String\">Total</Data></Cell>\n");
    xml.push_str(&number_cell(&grand_total.to_string(), Some("money")));
    xml.push_str("   </Row>\n");

    xml.push_str("  </Table>\n </Worksheet>\n</Workbook>\n");
    xml
}

fn string_cell(value: &str, style: Option<&str>) -> String {
    cell("String", &escape_xml(value), style)
}

fn number_cell(value: &str, style: Option<&str>) -> String {
    cell("Number", value, style)
}

fn cell(kind: &str, value: &str, style: Option<&str>) -> String {
    match style {
        Some(id) => format!(
            "    <Cell ss:StyleID=\"{}\"><Data ss:Type=\"{}\">{}</Data></Cell>\n",
            id, kind, value
        ),
        None => format!("    <Cell><Data ss:Type=\"{}\">{}</Data></Cell>\n", kind, value),
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
