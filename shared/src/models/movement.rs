//! Stock movement models and the ledger arithmetic
//!
//! Every change to a product's current stock is described by a [`StockChange`]
//! and recorded as one immutable [`StockMovement`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Goods received into the warehouse
    Entrada,
    /// Goods leaving with a sale
    Salida,
    /// Correction in either direction
    Ajuste,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entrada => "entrada",
            MovementKind::Salida => "salida",
            MovementKind::Ajuste => "ajuste",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "entrada" => Some(MovementKind::Entrada),
            "salida" => Some(MovementKind::Salida),
            "ajuste" => Some(MovementKind::Ajuste),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business event that produced a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPurpose {
    PedidoRecibido,
    PedidoRevertido,
    Venta,
    AjusteManual,
}

impl MovementPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementPurpose::PedidoRecibido => "pedido_recibido",
            MovementPurpose::PedidoRevertido => "pedido_revertido",
            MovementPurpose::Venta => "venta",
            MovementPurpose::AjusteManual => "ajuste_manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pedido_recibido" => Some(MovementPurpose::PedidoRecibido),
            "pedido_revertido" => Some(MovementPurpose::PedidoRevertido),
            "venta" => Some(MovementPurpose::Venta),
            "ajuste_manual" => Some(MovementPurpose::AjusteManual),
            _ => None,
        }
    }

    /// Movement kind recorded for this purpose
    pub fn kind(&self) -> MovementKind {
        match self {
            MovementPurpose::PedidoRecibido => MovementKind::Entrada,
            MovementPurpose::Venta => MovementKind::Salida,
            MovementPurpose::PedidoRevertido | MovementPurpose::AjusteManual => MovementKind::Ajuste,
        }
    }
}

/// An immutable stock movement record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: MovementKind,
    #[serde(rename = "motivo")]
    pub purpose: MovementPurpose,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    pub stock_anterior: i32,
    pub stock_nuevo: i32,
    pub user_id: Option<Uuid>,
    #[serde(rename = "observacion")]
    pub observation: Option<String>,
    pub pedido_id: Option<Uuid>,
    pub salida_id: Option<Uuid>,
    #[serde(rename = "fecha")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed stock delta this movement represents
    pub fn signed_delta(&self) -> i32 {
        self.stock_nuevo - self.stock_anterior
    }

    /// Check that the recorded pair agrees with the kind and quantity
    pub fn is_consistent(&self) -> bool {
        let delta = self.signed_delta();
        match self.kind {
            MovementKind::Entrada => delta == self.quantity,
            MovementKind::Salida => delta == -self.quantity,
            MovementKind::Ajuste => delta.abs() == self.quantity,
        }
    }
}

/// Reasons a stock change cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerViolation {
    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("Stock cannot go below zero (current {current}, requested {requested})")]
    WouldGoNegative { current: i32, requested: i32 },

    #[error("Stock would exceed the maximum of {maximum} (current {current}, incoming {incoming})")]
    ExceedsMaximum {
        current: i32,
        incoming: i32,
        maximum: i32,
    },
}

/// A validated before/after pair for one product's current stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous: i32,
    pub new: i32,
}

impl StockChange {
    /// Add incoming units, honouring a nonzero maximum
    pub fn increase(current: i32, quantity: i32, maximum: i32) -> Result<Self, LedgerViolation> {
        if quantity <= 0 {
            return Err(LedgerViolation::NonPositiveQuantity);
        }
        let exceeds = LedgerViolation::ExceedsMaximum {
            current,
            incoming: quantity,
            maximum,
        };
        let new = current.checked_add(quantity).ok_or(exceeds.clone())?;
        if maximum > 0 && new > maximum {
            return Err(exceeds);
        }
        Ok(Self {
            previous: current,
            new,
        })
    }

    /// Remove units, never dropping below zero
    pub fn decrease(current: i32, quantity: i32) -> Result<Self, LedgerViolation> {
        if quantity <= 0 {
            return Err(LedgerViolation::NonPositiveQuantity);
        }
        if quantity > current {
            return Err(LedgerViolation::WouldGoNegative {
                current,
                requested: quantity,
            });
        }
        Ok(Self {
            previous: current,
            new: current - quantity,
        })
    }

    /// Signed manual correction
    pub fn adjust(current: i32, delta: i32, maximum: i32) -> Result<Self, LedgerViolation> {
        if delta >= 0 {
            Self::increase(current, delta, maximum)
        } else {
            Self::decrease(current, delta.checked_neg().unwrap_or(i32::MAX))
        }
    }

    pub fn delta(&self) -> i32 {
        self.new - self.previous
    }

    /// Unsigned quantity stored on the movement row
    pub fn quantity(&self) -> i32 {
        self.delta().abs()
    }
}

/// Observation text written for a received purchase order
pub fn receipt_observation(order_id: Uuid) -> String {
    format!("Pedido {} recibido", order_id)
}

/// Observation text written when a received purchase order is reverted
pub fn reversal_observation(order_id: Uuid) -> String {
    format!("Pedido {} revertido", order_id)
}

/// Observation text written for each line of a sale
pub fn sale_observation(ticket: &str) -> String {
    format!("Salida {}", ticket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_within_maximum() {
        let change = StockChange::increase(3, 7, 10).unwrap();
        assert_eq!(change.previous, 3);
        assert_eq!(change.new, 10);
        assert_eq!(change.delta(), 7);
    }

    #[test]
    fn test_increase_unbounded_when_maximum_zero() {
        let change = StockChange::increase(1_000, 500, 0).unwrap();
        assert_eq!(change.new, 1_500);
    }

    #[test]
    fn test_increase_over_maximum_rejected() {
        let err = StockChange::increase(8, 3, 10).unwrap_err();
        assert_eq!(
            err,
            LedgerViolation::ExceedsMaximum {
                current: 8,
                incoming: 3,
                maximum: 10
            }
        );
    }

    #[test]
    fn test_increase_overflow_rejected() {
        assert!(StockChange::increase(i32::MAX, 1, 0).is_err());
    }

    #[test]
    fn test_decrease_to_zero() {
        let change = StockChange::decrease(5, 5).unwrap();
        assert_eq!(change.new, 0);
        assert_eq!(change.quantity(), 5);
    }

    #[test]
    fn test_decrease_below_zero_rejected() {
        assert_eq!(
            StockChange::decrease(5, 6),
            Err(LedgerViolation::WouldGoNegative {
                current: 5,
                requested: 6
            })
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(StockChange::increase(1, 0, 0), Err(LedgerViolation::NonPositiveQuantity));
        assert_eq!(StockChange::decrease(1, 0), Err(LedgerViolation::NonPositiveQuantity));
        assert_eq!(StockChange::adjust(1, 0, 0), Err(LedgerViolation::NonPositiveQuantity));
    }

    #[test]
    fn test_adjust_both_directions() {
        assert_eq!(StockChange::adjust(4, -4, 0).unwrap().new, 0);
        assert_eq!(StockChange::adjust(4, 2, 6).unwrap().new, 6);
        assert!(StockChange::adjust(4, 3, 6).is_err());
        assert!(StockChange::adjust(4, i32::MIN, 0).is_err());
    }

    #[test]
    fn test_purpose_kinds() {
        assert_eq!(MovementPurpose::PedidoRecibido.kind(), MovementKind::Entrada);
        assert_eq!(MovementPurpose::PedidoRevertido.kind(), MovementKind::Ajuste);
        assert_eq!(MovementPurpose::Venta.kind(), MovementKind::Salida);
        assert_eq!(MovementPurpose::AjusteManual.kind(), MovementKind::Ajuste);
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [MovementKind::Entrada, MovementKind::Salida, MovementKind::Ajuste] {
            assert_eq!(MovementKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::parse(" ENTRADA "), Some(MovementKind::Entrada));
        assert_eq!(MovementKind::parse("transfer"), None);
    }

    #[test]
    fn test_observation_texts() {
        let id = Uuid::nil();
        assert_eq!(
            receipt_observation(id),
            "Pedido 00000000-0000-0000-0000-000000000000 recibido"
        );
        assert!(reversal_observation(id).ends_with("revertido"));
        assert_eq!(sale_observation("TK-1"), "Salida TK-1");
    }
}
