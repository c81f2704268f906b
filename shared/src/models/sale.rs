//! Sale (salida) models and line planning
//!
//! [`plan_sale`] resolves prices, checks stock and computes totals for a sale
//! request against products that are already locked by the caller.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{LedgerViolation, Product, StockChange};
use crate::validation::{max_sale_amount, validate_unit_price};

/// Channel the sale goes through, selects the default price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleChannel {
    Tienda,
    Ruta,
}

impl SaleChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleChannel::Tienda => "tienda",
            SaleChannel::Ruta => "ruta",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tienda" => Some(SaleChannel::Tienda),
            "ruta" => Some(SaleChannel::Ruta),
            _ => None,
        }
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Contado,
    Credito,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Contado => "contado",
            PaymentType::Credito => "credito",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "contado" => Some(PaymentType::Contado),
            "credito" | "crédito" => Some(PaymentType::Credito),
            _ => None,
        }
    }
}

/// A registered sale with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub ticket: String,
    #[serde(rename = "vendedorId")]
    pub seller_id: Uuid,
    #[serde(rename = "vendedorNombre")]
    pub seller_name: Option<String>,
    #[serde(rename = "tipoSalida")]
    pub channel: SaleChannel,
    #[serde(rename = "tipoVenta")]
    pub payment_type: PaymentType,
    pub estado: String,
    pub fecha_entrega: Option<NaiveDate>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub detalles: Vec<SaleLine>,
}

/// One product line of a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "productoNombre")]
    pub product_name: String,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
}

/// A requested sale line before validation
#[derive(Debug, Clone, PartialEq)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// A validated line ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub change: StockChange,
}

/// Validated sale lines and their total
#[derive(Debug, Clone, PartialEq)]
pub struct SalePlan {
    pub lines: Vec<PlannedLine>,
    pub total: Decimal,
}

/// Business rules a sale request can break
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleRuleViolation {
    #[error("A sale must contain at least one product")]
    EmptySale,

    #[error("Product {0} appears on more than one line")]
    DuplicateProduct(Uuid),

    #[error("Product {0} does not exist")]
    UnknownProduct(Uuid),

    #[error("Unit price for '{product}' {reason}")]
    InvalidPrice { product: String, reason: &'static str },

    #[error("Amount for '{product}' is too large to record")]
    AmountTooLarge { product: String },

    #[error("Quantity for '{product}' must be greater than zero")]
    NonPositiveQuantity { product: String },

    #[error("Insufficient stock for '{product}': available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },
}

/// Reject empty requests and repeated products
pub fn check_sale_lines(lines: &[LineRequest]) -> Result<(), SaleRuleViolation> {
    if lines.is_empty() {
        return Err(SaleRuleViolation::EmptySale);
    }
    let mut seen = HashSet::new();
    for line in lines {
        if !seen.insert(line.product_id) {
            return Err(SaleRuleViolation::DuplicateProduct(line.product_id));
        }
    }
    Ok(())
}

/// Product ids of a request in ascending order, the lock order
pub fn lock_order(lines: &[LineRequest]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Resolve prices, check stock and compute totals
pub fn plan_sale(
    channel: SaleChannel,
    lines: &[LineRequest],
    products: &[Product],
) -> Result<SalePlan, SaleRuleViolation> {
    check_sale_lines(lines)?;

    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
    if let Some(missing) = lines.iter().find(|l| !by_id.contains_key(&l.product_id)) {
        return Err(SaleRuleViolation::UnknownProduct(missing.product_id));
    }

    let mut planned = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let product = by_id[&line.product_id];

        let unit_price = line.unit_price.unwrap_or_else(|| product.channel_price(channel));
        validate_unit_price(unit_price).map_err(|reason| SaleRuleViolation::InvalidPrice {
            product: product.name.clone(),
            reason,
        })?;

        let change = StockChange::decrease(product.stock_actual, line.quantity).map_err(|e| match e {
            LedgerViolation::WouldGoNegative { current, requested } => SaleRuleViolation::InsufficientStock {
                product: product.name.clone(),
                available: current,
                requested,
            },
            _ => SaleRuleViolation::NonPositiveQuantity {
                product: product.name.clone(),
            },
        })?;

        let too_large = || SaleRuleViolation::AmountTooLarge {
            product: product.name.clone(),
        };
        let subtotal = unit_price
            .checked_mul(Decimal::from(line.quantity))
            .filter(|amount| *amount < max_sale_amount())
            .ok_or_else(too_large)?;
        total = total
            .checked_add(subtotal)
            .filter(|amount| *amount < max_sale_amount())
            .ok_or_else(too_large)?;

        planned.push(PlannedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price,
            subtotal,
            change,
        });
    }

    Ok(SalePlan {
        lines: planned,
        total,
    })
}

/// Human-readable ticket from a timestamp and a random component
pub fn format_ticket(at: DateTime<Utc>, random: u32) -> String {
    format!("TK-{}-{:08X}", at.format("%Y%m%d%H%M%S"), random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(name: &str, stock: i32, store: i64, route: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            store_price: Decimal::from(store),
            route_price: Decimal::from(route),
            stock_actual: stock,
            stock_minimo: 2,
            stock_maximo: 0,
            available: true,
            unavailable_reason: None,
            supplier_id: None,
            product_type_id: None,
            brand_id: None,
            model_id: None,
            ultima_fecha_movimiento: None,
            created_at: Utc::now(),
        }
    }

    fn line(product: &Product, quantity: i32, price: Option<i64>) -> LineRequest {
        LineRequest {
            product_id: product.id,
            quantity,
            unit_price: price.map(Decimal::from),
        }
    }

    #[test]
    fn test_channel_price_defaults() {
        let p = product("Cable", 5, 20, 18);
        let plan = plan_sale(SaleChannel::Ruta, &[line(&p, 2, None)], &[p.clone()]).unwrap();
        assert_eq!(plan.lines[0].unit_price, Decimal::from(18));
        assert_eq!(plan.total, Decimal::from(36));

        let plan = plan_sale(SaleChannel::Tienda, &[line(&p, 2, None)], &[p.clone()]).unwrap();
        assert_eq!(plan.total, Decimal::from(40));
    }

    #[test]
    fn test_explicit_price_overrides_channel() {
        let p = product("Cable", 5, 20, 18);
        let plan = plan_sale(SaleChannel::Tienda, &[line(&p, 3, Some(15))], &[p.clone()]).unwrap();
        assert_eq!(plan.lines[0].subtotal, Decimal::from(45));
    }

    #[test]
    fn test_exact_stock_sells_out() {
        let p = product("Cable", 5, 20, 18);
        let plan = plan_sale(SaleChannel::Tienda, &[line(&p, 5, None)], &[p.clone()]).unwrap();
        assert_eq!(plan.lines[0].change.new, 0);
    }

    #[test]
    fn test_one_over_stock_fails() {
        let p = product("Cable", 5, 20, 18);
        let err = plan_sale(SaleChannel::Tienda, &[line(&p, 6, None)], &[p.clone()]).unwrap_err();
        assert_eq!(
            err,
            SaleRuleViolation::InsufficientStock {
                product: "Cable".into(),
                available: 5,
                requested: 6
            }
        );
    }

    #[test]
    fn test_zero_price_rejected() {
        let p = product("Regalo", 5, 0, 0);
        assert!(matches!(
            plan_sale(SaleChannel::Tienda, &[line(&p, 1, None)], &[p.clone()]),
            Err(SaleRuleViolation::InvalidPrice { .. })
        ));
        let q = product("Cable", 5, 20, 18);
        assert!(matches!(
            plan_sale(SaleChannel::Tienda, &[line(&q, 1, Some(-1))], &[q.clone()]),
            Err(SaleRuleViolation::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_huge_price_is_rejected_not_overflowed() {
        let p = product("Cable", 10, 20, 18);
        let request = LineRequest {
            product_id: p.id,
            quantity: 10,
            unit_price: Some(Decimal::MAX),
        };
        assert!(matches!(
            plan_sale(SaleChannel::Tienda, &[request], &[p.clone()]),
            Err(SaleRuleViolation::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_price_must_fit_two_decimals() {
        let p = product("Cable", 10, 20, 18);
        let request = LineRequest {
            product_id: p.id,
            quantity: 1,
            unit_price: Some(Decimal::new(1, 3)),
        };
        assert!(matches!(
            plan_sale(SaleChannel::Tienda, &[request], &[p.clone()]),
            Err(SaleRuleViolation::InvalidPrice { .. })
        ));

        let trailing_zero = LineRequest {
            product_id: p.id,
            quantity: 2,
            unit_price: Some(Decimal::new(12_500, 3)),
        };
        let plan = plan_sale(SaleChannel::Tienda, &[trailing_zero], &[p.clone()]).unwrap();
        assert_eq!(plan.total, Decimal::from(25));
    }

    #[test]
    fn test_subtotal_beyond_storage_is_rejected() {
        let p = product("Servidor", i32::MAX, 20, 18);
        let request = LineRequest {
            product_id: p.id,
            quantity: 1_000,
            unit_price: Some(Decimal::new(999_999_999_999, 2)),
        };
        assert_eq!(
            plan_sale(SaleChannel::Tienda, &[request], &[p.clone()]),
            Err(SaleRuleViolation::AmountTooLarge { product: "Servidor".into() })
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let p = product("Cable", 5, 20, 18);
        assert!(matches!(
            plan_sale(SaleChannel::Tienda, &[line(&p, 0, None)], &[p.clone()]),
            Err(SaleRuleViolation::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let p = product("Cable", 5, 20, 18);
        let ghost = product("Fantasma", 5, 20, 18);
        let err = plan_sale(
            SaleChannel::Tienda,
            &[line(&p, 1, None), line(&ghost, 1, None)],
            &[p.clone()],
        )
        .unwrap_err();
        assert_eq!(err, SaleRuleViolation::UnknownProduct(ghost.id));
    }

    #[test]
    fn test_empty_and_duplicate_lines_rejected() {
        assert_eq!(check_sale_lines(&[]), Err(SaleRuleViolation::EmptySale));
        let p = product("Cable", 5, 20, 18);
        assert_eq!(
            check_sale_lines(&[line(&p, 1, None), line(&p, 2, None)]),
            Err(SaleRuleViolation::DuplicateProduct(p.id))
        );
    }

    #[test]
    fn test_lock_order_is_sorted() {
        let a = product("A", 1, 1, 1);
        let b = product("B", 1, 1, 1);
        let ids = lock_order(&[line(&a, 1, None), line(&b, 1, None)]);
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_ticket_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_ticket(at, 0xABCDEF), "TK-20240309140507-00ABCDEF");
        assert_eq!(format_ticket(at, u32::MAX), "TK-20240309140507-FFFFFFFF");
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(SaleChannel::parse("RUTA"), Some(SaleChannel::Ruta));
        assert_eq!(PaymentType::parse("crédito"), Some(PaymentType::Credito));
        assert_eq!(PaymentType::parse("tarjeta"), None);
    }
}
