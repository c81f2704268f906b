//! HTTP handler for the sales report download

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::types::{parse_query_date, DateRange};

use crate::error::{AppError, AppResult};
use crate::middleware::{require_role, CurrentUser};
use crate::models::roles;
use crate::services::ReportService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ReportQuery {
    fn range(&self) -> AppResult<DateRange> {
        let parse = |field: &str, value: Option<&str>| -> AppResult<NaiveDate> {
            let raw = value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::field(field, format!("{} is required", field)))?;
            parse_query_date(raw)
                .ok_or_else(|| AppError::field(field, format!("'{}' is not a valid YYYY-MM-DD date", raw)))
        };
        let start = parse("start", self.start.as_deref())?;
        let end = parse("end", self.end.as_deref())?;
        DateRange::new(start, end).map_err(|m| AppError::field("start", m))
    }
}

/// Download the sales workbook for a date range
pub async fn sales_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    require_role(&user, &[roles::ADMIN])?;
    let range = query.range()?;

    let service = ReportService::new(state.db);
    let workbook = service.sales_report(range).await?;

    let disposition = format!(
        "attachment; filename=\"reporte_salidas_{}_{}.xls\"",
        range.start.format("%Y%m%d"),
        range.end.format("%Y%m%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/vnd.ms-excel; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: Option<&str>, end: Option<&str>) -> ReportQuery {
        ReportQuery {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn test_range_parses_valid_dates() {
        let range = query(Some("2024-01-01"), Some("2024-01-31")).range().unwrap();
        assert_eq!(range.start.to_string(), "2024-01-01");
    }

    #[test]
    fn test_range_rejects_bad_input() {
        assert!(query(None, Some("2024-01-31")).range().is_err());
        assert!(query(Some("01/01/2024"), Some("2024-01-31")).range().is_err());
        assert!(query(Some("2024-02-01"), Some("2024-01-31")).range().is_err());
    }
}
