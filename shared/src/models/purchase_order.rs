//! Purchase order (pedido) models and state machine rules
//!
//! Pedido states are free text configured by administrators. Workflow rules
//! only care about the semantic class of a state, see [`OrderStatus`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A purchase order placed with a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    pub product_id: Option<Uuid>,
    /// Linked product name, or the stored descriptor while unlinked
    #[serde(rename = "productoNombre")]
    pub product_name: Option<String>,
    pub product_type_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub model_id: Option<Uuid>,
    #[serde(rename = "marcaNombre")]
    pub brand_name: Option<String>,
    #[serde(rename = "modeloNombre")]
    pub model_name: Option<String>,
    pub cantidad_solicitada: i32,
    pub fecha_esperada: Option<NaiveDate>,
    pub fecha_recibido: Option<NaiveDate>,
    pub estado: String,
    #[serde(rename = "tipoEstado")]
    pub status: OrderStatus,
    #[serde(rename = "usuarioId")]
    pub requested_by: Option<Uuid>,
    pub cost_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Semantic class of a configured pedido state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Received,
    Canceled,
    Other,
}

impl OrderStatus {
    /// Classify a configured state name by its normalized prefix
    pub fn classify(state_name: &str) -> Self {
        let normalized = normalize_label(state_name);
        if normalized.starts_with("recib") {
            OrderStatus::Received
        } else if normalized.starts_with("cancel") {
            OrderStatus::Canceled
        } else if normalized.starts_with("pend") {
            OrderStatus::Pending
        } else {
            OrderStatus::Other
        }
    }

    pub fn is_received(&self) -> bool {
        matches!(self, OrderStatus::Received)
    }
}

/// Trim, lowercase and fold Spanish accents
pub fn normalize_label(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

/// What the ledger must do as part of a pedido update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    /// Add the requested quantity to the product
    Apply,
    /// Remove the previously received quantity
    Revert,
    Nothing,
}

/// Rule violations detected while planning a pedido update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRuleViolation {
    #[error("Requested quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("Quantity cannot change on a received order unless it leaves the received state")]
    QuantityLockedWhileReceived,

    #[error("State '{0}' is not an active pedido state")]
    InactiveState(String),
}

/// Current facts about an order, read under its row lock
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub state: String,
    pub quantity: i32,
    pub received_date: Option<NaiveDate>,
    /// The ledger holds an unreverted receipt for this order
    pub receipt_on_ledger: bool,
}

/// Fields a pedido update may carry
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub state: Option<String>,
    pub quantity: Option<i32>,
    pub received_date: Option<NaiveDate>,
}

/// Outcome of planning a pedido update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Canonical state name to store
    pub state: String,
    pub status: OrderStatus,
    pub quantity: i32,
    pub received_date: Option<NaiveDate>,
    pub action: LedgerAction,
}

/// Decide the resulting state, quantity, received date and ledger action
pub fn plan_transition(
    current: &OrderSnapshot,
    changes: &OrderChanges,
    active_states: &[String],
    today: NaiveDate,
) -> Result<TransitionPlan, OrderRuleViolation> {
    let state = match &changes.state {
        Some(requested) => crate::validation::match_active_state(requested, active_states)
            .ok_or_else(|| OrderRuleViolation::InactiveState(requested.trim().to_string()))?
            .to_string(),
        None => current.state.clone(),
    };

    let current_status = OrderStatus::classify(&current.state);
    let status = OrderStatus::classify(&state);

    let quantity = match changes.quantity {
        Some(q) if q <= 0 => return Err(OrderRuleViolation::NonPositiveQuantity),
        Some(q) if q != current.quantity && current_status.is_received() && status.is_received() => {
            return Err(OrderRuleViolation::QuantityLockedWhileReceived)
        }
        Some(q) => q,
        None => current.quantity,
    };

    let action = if status.is_received() && !current.receipt_on_ledger {
        LedgerAction::Apply
    } else if !status.is_received() && current.receipt_on_ledger {
        LedgerAction::Revert
    } else {
        LedgerAction::Nothing
    };

    let entering = status.is_received() && (!current_status.is_received() || action == LedgerAction::Apply);
    let leaving = current_status.is_received() && !status.is_received();

    let received_date = if entering {
        changes.received_date.or(Some(today))
    } else if leaving {
        changes.received_date
    } else {
        changes.received_date.or(current.received_date)
    };

    Ok(TransitionPlan {
        state,
        status,
        quantity,
        received_date,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> Vec<String> {
        vec!["Pendiente".into(), "Recibido".into(), "Cancelado".into()]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn snapshot(state: &str, on_ledger: bool) -> OrderSnapshot {
        OrderSnapshot {
            state: state.to_string(),
            quantity: 10,
            received_date: on_ledger.then(|| NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()),
            receipt_on_ledger: on_ledger,
        }
    }

    #[test]
    fn test_classify_states() {
        assert_eq!(OrderStatus::classify("Recibido"), OrderStatus::Received);
        assert_eq!(OrderStatus::classify("  RECIBIDA parcial"), OrderStatus::Received);
        assert_eq!(OrderStatus::classify("Cancelado"), OrderStatus::Canceled);
        assert_eq!(OrderStatus::classify("pendiente"), OrderStatus::Pending);
        assert_eq!(OrderStatus::classify("En tránsito"), OrderStatus::Other);
    }

    #[test]
    fn test_negated_received_is_not_received() {
        assert_eq!(OrderStatus::classify("No recibido todavía"), OrderStatus::Other);
    }

    #[test]
    fn test_normalize_label_folds_accents() {
        assert_eq!(normalize_label(" Recíbído "), "recibido");
    }

    #[test]
    fn test_entering_received_applies_and_dates_today() {
        let changes = OrderChanges {
            state: Some("recibido".into()),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Pendiente", false), &changes, &states(), today()).unwrap();
        assert_eq!(plan.state, "Recibido");
        assert_eq!(plan.action, LedgerAction::Apply);
        assert_eq!(plan.received_date, Some(today()));
    }

    #[test]
    fn test_reconfirming_received_is_noop() {
        let changes = OrderChanges {
            state: Some("Recibido".into()),
            ..Default::default()
        };
        let current = snapshot("Recibido", true);
        let plan = plan_transition(&current, &changes, &states(), today()).unwrap();
        assert_eq!(plan.action, LedgerAction::Nothing);
        assert_eq!(plan.received_date, current.received_date);
    }

    #[test]
    fn test_reconfirming_without_receipt_applies() {
        let changes = OrderChanges {
            state: Some("Recibido".into()),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Recibido", false), &changes, &states(), today()).unwrap();
        assert_eq!(plan.action, LedgerAction::Apply);
        assert_eq!(plan.received_date, Some(today()));
    }

    #[test]
    fn test_leaving_received_reverts_and_clears_date() {
        let changes = OrderChanges {
            state: Some("Pendiente".into()),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Recibido", true), &changes, &states(), today()).unwrap();
        assert_eq!(plan.action, LedgerAction::Revert);
        assert_eq!(plan.received_date, None);
    }

    #[test]
    fn test_explicit_received_date_wins() {
        let explicit = NaiveDate::from_ymd_opt(2024, 5, 30).unwrap();
        let changes = OrderChanges {
            state: Some("Recibido".into()),
            received_date: Some(explicit),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Pendiente", false), &changes, &states(), today()).unwrap();
        assert_eq!(plan.received_date, Some(explicit));
    }

    #[test]
    fn test_quantity_locked_while_received() {
        let changes = OrderChanges {
            quantity: Some(12),
            ..Default::default()
        };
        assert_eq!(
            plan_transition(&snapshot("Recibido", true), &changes, &states(), today()),
            Err(OrderRuleViolation::QuantityLockedWhileReceived)
        );
    }

    #[test]
    fn test_quantity_change_allowed_when_leaving_received() {
        let changes = OrderChanges {
            state: Some("Pendiente".into()),
            quantity: Some(12),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Recibido", true), &changes, &states(), today()).unwrap();
        assert_eq!(plan.quantity, 12);
        assert_eq!(plan.action, LedgerAction::Revert);
    }

    #[test]
    fn test_same_quantity_on_received_is_allowed() {
        let changes = OrderChanges {
            quantity: Some(10),
            ..Default::default()
        };
        assert!(plan_transition(&snapshot("Recibido", true), &changes, &states(), today()).is_ok());
    }

    #[test]
    fn test_inactive_state_rejected() {
        let changes = OrderChanges {
            state: Some("Archivado".into()),
            ..Default::default()
        };
        assert_eq!(
            plan_transition(&snapshot("Pendiente", false), &changes, &states(), today()),
            Err(OrderRuleViolation::InactiveState("Archivado".into()))
        );
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let changes = OrderChanges {
            quantity: Some(0),
            ..Default::default()
        };
        assert_eq!(
            plan_transition(&snapshot("Pendiente", false), &changes, &states(), today()),
            Err(OrderRuleViolation::NonPositiveQuantity)
        );
    }
}
