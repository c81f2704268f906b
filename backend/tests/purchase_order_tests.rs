//! Purchase order planning tests
//!
//! Tests for the pedido state machine including:
//! - Which ledger action a state change calls for
//! - Received date and quantity rules
//! - State matching against the configured states

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{plan_transition, LedgerAction, OrderChanges, OrderRuleViolation, OrderSnapshot, OrderStatus};

fn active_states() -> Vec<String> {
    ["Pendiente", "En tránsito", "Recibido", "Cancelado"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn snapshot(state: &str, quantity: i32, receipt_on_ledger: bool) -> OrderSnapshot {
    OrderSnapshot {
        state: state.to_string(),
        quantity,
        received_date: receipt_on_ledger.then(today),
        receipt_on_ledger,
    }
}

fn to_state(state: &str) -> OrderChanges {
    OrderChanges {
        state: Some(state.to_string()),
        ..Default::default()
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;

    /// Entering a received state applies the receipt and stamps the date
    #[test]
    fn test_receive_applies_and_stamps_date() {
        let plan = plan_transition(&snapshot("Pendiente", 10, false), &to_state("recibido"), &active_states(), today())
            .unwrap();

        assert_eq!(plan.action, LedgerAction::Apply);
        assert_eq!(plan.state, "Recibido");
        assert_eq!(plan.status, OrderStatus::Received);
        assert_eq!(plan.received_date, Some(today()));
    }

    /// A receipt already on the ledger is not applied again
    #[test]
    fn test_receive_twice_does_nothing() {
        let plan = plan_transition(&snapshot("Recibido", 10, true), &to_state("Recibido"), &active_states(), today())
            .unwrap();
        assert_eq!(plan.action, LedgerAction::Nothing);
    }

    /// Leaving the received state reverts and clears the date
    #[test]
    fn test_leave_received_reverts() {
        for target in ["Pendiente", "Cancelado", "En tránsito"] {
            let plan = plan_transition(&snapshot("Recibido", 10, true), &to_state(target), &active_states(), today())
                .unwrap();
            assert_eq!(plan.action, LedgerAction::Revert, "moving to {}", target);
            assert_eq!(plan.received_date, None);
        }
    }

    /// An explicit received date is kept
    #[test]
    fn test_explicit_received_date_kept() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let changes = OrderChanges {
            state: Some("Recibido".into()),
            received_date: Some(date),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Pendiente", 4, false), &changes, &active_states(), today()).unwrap();
        assert_eq!(plan.received_date, Some(date));
    }

    #[test]
    fn test_quantity_locked_while_received() {
        let changes = OrderChanges {
            quantity: Some(12),
            ..Default::default()
        };
        assert_eq!(
            plan_transition(&snapshot("Recibido", 10, true), &changes, &active_states(), today()),
            Err(OrderRuleViolation::QuantityLockedWhileReceived)
        );
    }

    #[test]
    fn test_quantity_editable_when_leaving_received() {
        let changes = OrderChanges {
            state: Some("Cancelado".into()),
            quantity: Some(25),
            ..Default::default()
        };
        let plan = plan_transition(&snapshot("Recibido", 10, true), &changes, &active_states(), today()).unwrap();
        assert_eq!(plan.quantity, 25);
        assert_eq!(plan.action, LedgerAction::Revert);
    }

    #[test]
    fn test_inactive_state_rejected() {
        assert_eq!(
            plan_transition(&snapshot("Pendiente", 3, false), &to_state("Archivado"), &active_states(), today()),
            Err(OrderRuleViolation::InactiveState("Archivado".into()))
        );
    }

    #[test]
    fn test_negated_received_state_does_not_receive() {
        assert_eq!(OrderStatus::classify("No recibido todavía"), OrderStatus::Other);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn state_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["Pendiente", "En tránsito", "Recibido", "recibido", "Cancelado"])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The ledger is touched exactly when the received flag changes
    #[test]
    fn prop_action_follows_received_flag(
        from in state_strategy(),
        to in state_strategy(),
        quantity in 1i32..500,
    ) {
        let was_received = OrderStatus::classify(from).is_received();
        let current = snapshot(from, quantity, was_received);
        let plan = plan_transition(&current, &to_state(to), &active_states(), today()).unwrap();
        let now_received = plan.status.is_received();

        let expected = match (was_received, now_received) {
            (false, true) => LedgerAction::Apply,
            (true, false) => LedgerAction::Revert,
            _ => LedgerAction::Nothing,
        };
        prop_assert_eq!(plan.action, expected);
        prop_assert_eq!(plan.received_date.is_some(), now_received);
    }
}
