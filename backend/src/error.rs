//! Error handling for the Inventory Management backend
//!
//! Every failure is mapped to a status code and a JSON body of the form
//! `{"error": {"code", "message", "field"}}`. Database and internal details are
//! logged and never returned to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{LedgerViolation, OrderRuleViolation, SaleRuleViolation};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock ledger errors
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(message.into())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorDetail::new("UNAUTHORIZED", msg.clone())),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorDetail::new("FORBIDDEN", msg.clone())),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, ErrorDetail::new("VALIDATION_ERROR", msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorDetail::new("CONFLICT", msg.clone())),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Capacity(msg) => {
                (StatusCode::BAD_REQUEST, ErrorDetail::new("CAPACITY_EXCEEDED", msg.clone()))
            }
            AppError::InsufficientStock(msg) => {
                (StatusCode::BAD_REQUEST, ErrorDetail::new("INSUFFICIENT_STOCK", msg.clone()))
            }
            AppError::DatabaseError(e) if is_unique_violation(e) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", "A record with the same unique value already exists"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<LedgerViolation> for AppError {
    fn from(violation: LedgerViolation) -> Self {
        match violation {
            LedgerViolation::ExceedsMaximum { current, incoming, maximum } => AppError::Capacity(format!(
                "Adding {} units to a stock of {} exceeds the maximum of {}. Raise stockMaximo for this product first",
                incoming, current, maximum
            )),
            LedgerViolation::WouldGoNegative { .. } => AppError::InsufficientStock(violation.to_string()),
            LedgerViolation::NonPositiveQuantity => AppError::field("cantidad", violation.to_string()),
        }
    }
}

impl From<SaleRuleViolation> for AppError {
    fn from(violation: SaleRuleViolation) -> Self {
        match violation {
            SaleRuleViolation::InsufficientStock { .. } => AppError::InsufficientStock(violation.to_string()),
            SaleRuleViolation::EmptySale => AppError::field("productos", violation.to_string()),
            SaleRuleViolation::InvalidPrice { .. } | SaleRuleViolation::AmountTooLarge { .. } => {
                AppError::field("precioUnitario", violation.to_string())
            }
            SaleRuleViolation::NonPositiveQuantity { .. } => AppError::field("cantidad", violation.to_string()),
            SaleRuleViolation::DuplicateProduct(_) | SaleRuleViolation::UnknownProduct(_) => {
                AppError::field("productId", violation.to_string())
            }
        }
    }
}

impl From<OrderRuleViolation> for AppError {
    fn from(violation: OrderRuleViolation) -> Self {
        match violation {
            OrderRuleViolation::InactiveState(_) => AppError::field("estado", violation.to_string()),
            OrderRuleViolation::NonPositiveQuantity | OrderRuleViolation::QuantityLockedWhileReceived => {
                AppError::field("cantidadSolicitada", violation.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::field(field, message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::not_found("Pedido"), StatusCode::NOT_FOUND),
            (AppError::Capacity("full".into()), StatusCode::BAD_REQUEST),
            (AppError::InsufficientStock("none".into()), StatusCode::BAD_REQUEST),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_and_detail().0, status);
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let (_, detail) = AppError::Internal("connection refused at 10.0.0.3".into()).status_and_detail();
        assert!(!detail.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_capacity_message_is_actionable() {
        let err: AppError = LedgerViolation::ExceedsMaximum {
            current: 8,
            incoming: 5,
            maximum: 10,
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.code, "CAPACITY_EXCEEDED");
        assert!(detail.message.contains("stockMaximo"));
    }

    #[test]
    fn test_insufficient_stock_names_product() {
        let err: AppError = SaleRuleViolation::InsufficientStock {
            product: "Cable HDMI".into(),
            available: 5,
            requested: 6,
        }
        .into();
        let (_, detail) = err.status_and_detail();
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        assert!(detail.message.contains("Cable HDMI"));
    }

    #[test]
    fn test_price_violations_are_bad_requests() {
        let violations = [
            SaleRuleViolation::InvalidPrice {
                product: "Cable HDMI".into(),
                reason: "must have at most two decimals",
            },
            SaleRuleViolation::AmountTooLarge {
                product: "Cable HDMI".into(),
            },
        ];
        for violation in violations {
            let err: AppError = violation.into();
            let (status, detail) = err.status_and_detail();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(detail.field.as_deref(), Some("precioUnitario"));
        }
    }

    #[test]
    fn test_order_rule_maps_to_field() {
        let err: AppError = OrderRuleViolation::InactiveState("Archivado".into()).into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "estado"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
