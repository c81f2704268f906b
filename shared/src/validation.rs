//! Validation utilities for the Inventory Management backend

use rust_decimal::Decimal;

use crate::models::normalize_label;

// ============================================================================
// Workflow State Validations
// ============================================================================

/// Find the configured active state matching a requested name
///
/// Comparison ignores surrounding whitespace, case and accents. The
/// configured spelling is returned so it is what gets stored.
pub fn match_active_state<'a>(requested: &str, active_states: &'a [String]) -> Option<&'a str> {
    let wanted = normalize_label(requested);
    if wanted.is_empty() {
        return None;
    }
    active_states
        .iter()
        .find(|s| normalize_label(s) == wanted)
        .map(String::as_str)
}

// ============================================================================
// Quantity and Price Validations
// ============================================================================

/// Validate an optional unit cost on a purchase order
pub fn validate_cost_price(cost: Option<Decimal>) -> Result<(), &'static str> {
    match cost {
        Some(c) if c < Decimal::ZERO => Err("Cost price cannot be negative"),
        Some(c) if c.normalize().scale() > PRICE_SCALE => Err("Cost price must have at most two decimals"),
        Some(c) if c >= max_unit_price() => Err("Cost price must be below 10000000000"),
        _ => Ok(()),
    }
}

/// Prices are stored with two decimals
pub const PRICE_SCALE: u32 = 2;

/// Exclusive upper bound of a stored unit price, `NUMERIC(12, 2)`
pub fn max_unit_price() -> Decimal {
    Decimal::from(10_000_000_000i64)
}

/// Exclusive upper bound of a stored subtotal or total, `NUMERIC(14, 2)`
pub fn max_sale_amount() -> Decimal {
    Decimal::from(1_000_000_000_000i64)
}

/// Validate a sale unit price
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price <= Decimal::ZERO {
        return Err("must be greater than zero");
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err("must have at most two decimals");
    }
    if price >= max_unit_price() {
        return Err("must be below 10000000000");
    }
    Ok(())
}

/// Validate a manual adjustment delta
pub fn validate_adjustment(delta: i32) -> Result<(), &'static str> {
    if delta == 0 {
        return Err("Adjustment cannot be zero; use a positive value to add and a negative value to remove");
    }
    Ok(())
}
