//! Status transition policy tests
//!
//! Property-based and scenario tests for:
//! - Unknown status values are always rejected with the valid set
//! - Completed purchase orders are immutable
//! - GRN writes cascade exactly once to the purchase order
//! - The role-keyed order lifecycle

use proptest::prelude::*;
use shared::{
    can_transition, check_transition, plan_grn_status, plan_purchase_order_update,
    valid_statuses, ActorRole, DocumentKind, GrnStatus, OrderLifecycleStatus,
    PurchaseOrderDeliveryStatus, PurchaseOrderStatus, StatusError, StatusVocabulary,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn kind_strategy() -> impl Strategy<Value = DocumentKind> {
    prop::sample::select(DocumentKind::ALL.to_vec())
}

fn role_strategy() -> impl Strategy<Value = ActorRole> {
    prop_oneof![
        Just(ActorRole::Vendor),
        Just(ActorRole::Customer),
        Just(ActorRole::Admin),
        Just(ActorRole::Delivery),
    ]
}

/// A kind together with one of its own statuses
fn kind_and_status_strategy() -> impl Strategy<Value = (DocumentKind, &'static str)> {
    kind_strategy().prop_flat_map(|kind| {
        prop::sample::select(valid_statuses(kind).to_vec()).prop_map(move |s| (kind, s))
    })
}

fn lifecycle_strategy() -> impl Strategy<Value = OrderLifecycleStatus> {
    prop::sample::select(OrderLifecycleStatus::ALL.to_vec())
}

fn purchase_order_status_strategy() -> impl Strategy<Value = PurchaseOrderStatus> {
    prop::sample::select(PurchaseOrderStatus::ALL.to_vec())
}

fn grn_status_strategy() -> impl Strategy<Value = GrnStatus> {
    prop::sample::select(GrnStatus::ALL.to_vec())
}

// ============================================================================
// Property: unknown statuses are rejected with the valid set
// ============================================================================

proptest! {
    #[test]
    fn prop_unknown_status_is_invalid(
        (kind, current) in kind_and_status_strategy(),
        requested in "[A-Za-z_]{1,16}",
        role in role_strategy(),
    ) {
        prop_assume!(!valid_statuses(kind).contains(&requested.as_str()));

        match can_transition(kind, current, &requested, role) {
            Err(StatusError::InvalidStatus { valid, requested: echoed, .. }) => {
                prop_assert_eq!(valid, valid_statuses(kind));
                prop_assert_eq!(echoed, requested);
            }
            other => prop_assert!(false, "expected InvalidStatus, got {:?}", other),
        }
    }

    #[test]
    fn prop_unknown_status_wins_over_unknown_current(
        kind in kind_strategy(),
        role in role_strategy(),
    ) {
        // Callers always learn the valid set for the value they sent
        let err = can_transition(kind, "bogus-current", "bogus-requested", role).unwrap_err();
        let is_requested_value = matches!(
            err,
            StatusError::InvalidStatus { ref requested, .. } if requested == "bogus-requested"
        );
        prop_assert!(is_requested_value);
    }

    #[test]
    fn prop_flat_kinds_accept_every_member(
        current_idx in 0usize..4,
        requested_idx in 0usize..4,
        role in role_strategy(),
    ) {
        for kind in [DocumentKind::Order, DocumentKind::Grn, DocumentKind::ReturnOrder] {
            let statuses = valid_statuses(kind);
            let current = statuses[current_idx % statuses.len()];
            let requested = statuses[requested_idx % statuses.len()];
            prop_assert_eq!(can_transition(kind, current, requested, role), Ok(true));
        }
    }
}

// ============================================================================
// Property: completed purchase orders are immutable
// ============================================================================

proptest! {
    #[test]
    fn prop_completed_purchase_order_only_accepts_noop(
        requested in proptest::option::of(purchase_order_status_strategy()),
        has_other_changes in any::<bool>(),
    ) {
        let result = plan_purchase_order_update(
            PurchaseOrderStatus::Completed,
            requested.map(|s| s.as_str()),
            has_other_changes,
        );

        let is_noop = !has_other_changes
            && requested.map_or(true, |s| s == PurchaseOrderStatus::Completed);

        if is_noop {
            prop_assert_eq!(result, Ok(None));
        } else {
            let is_terminal_violation = matches!(
                result,
                Err(StatusError::TerminalStateViolation { .. })
            );
            prop_assert!(is_terminal_violation);
        }
    }

    #[test]
    fn prop_open_purchase_orders_move_freely(
        current in purchase_order_status_strategy(),
        requested in purchase_order_status_strategy(),
        role in role_strategy(),
    ) {
        prop_assume!(current != PurchaseOrderStatus::Completed);
        prop_assert_eq!(
            can_transition(DocumentKind::PurchaseOrder, current.as_str(), requested.as_str(), role),
            Ok(true)
        );
    }
}

// ============================================================================
// Property: GRN cascade
// ============================================================================

proptest! {
    #[test]
    fn prop_received_always_delivers_purchase_order(
        previous in proptest::option::of(grn_status_strategy()),
    ) {
        let plan = plan_grn_status(previous, "Received").unwrap();
        prop_assert_eq!(plan.next, GrnStatus::Received);
        prop_assert_eq!(plan.cascade, Some(PurchaseOrderDeliveryStatus::Delivered));
    }

    #[test]
    fn prop_rejection_cascades_once(
        previous in proptest::option::of(grn_status_strategy()),
    ) {
        let plan = plan_grn_status(previous, "Rejected").unwrap();
        let expected = if previous == Some(GrnStatus::Rejected) {
            None
        } else {
            Some(PurchaseOrderDeliveryStatus::Created)
        };
        prop_assert_eq!(plan.cascade, expected);
    }
}

// ============================================================================
// Property: order lifecycle
// ============================================================================

proptest! {
    #[test]
    fn prop_lifecycle_decision_matches_permitted_targets(
        current in lifecycle_strategy(),
        requested in lifecycle_strategy(),
        role in role_strategy(),
    ) {
        let allowed = current.permitted_targets(role).contains(&requested);
        prop_assert_eq!(
            can_transition(DocumentKind::OrderLifecycle, current.as_str(), requested.as_str(), role),
            Ok(allowed)
        );
    }

    #[test]
    fn prop_terminal_lifecycle_states_have_no_exits(
        requested in lifecycle_strategy(),
        role in role_strategy(),
    ) {
        for terminal in [
            OrderLifecycleStatus::Delivered,
            OrderLifecycleStatus::Rejected,
            OrderLifecycleStatus::Cancelled,
        ] {
            let result = check_transition(
                DocumentKind::OrderLifecycle,
                terminal.as_str(),
                requested.as_str(),
                role,
            );
            let is_terminal_violation = matches!(
                result,
                Err(StatusError::TerminalStateViolation { .. })
            );
            prop_assert!(is_terminal_violation);
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn test_new_received_grn_delivers_purchase_order() {
        let plan = plan_grn_status(None, "Received").unwrap();
        assert_eq!(plan.previous, None);
        assert_eq!(plan.next, GrnStatus::Received);
        assert_eq!(plan.cascade, Some(PurchaseOrderDeliveryStatus::Delivered));
    }

    #[test]
    fn test_rejecting_received_grn_reopens_purchase_order() {
        let plan = plan_grn_status(Some(GrnStatus::Received), "Rejected").unwrap();
        assert_eq!(plan.previous, Some(GrnStatus::Received));
        assert_eq!(plan.next, GrnStatus::Rejected);
        assert_eq!(plan.cascade, Some(PurchaseOrderDeliveryStatus::Created));
    }

    #[test]
    fn test_completed_purchase_order_cannot_return_to_draft() {
        let err =
            plan_purchase_order_update(PurchaseOrderStatus::Completed, Some("Draft"), false)
                .unwrap_err();
        assert!(matches!(err, StatusError::TerminalStateViolation { .. }));
        assert!(err.to_string().contains("immutable"));
    }

    #[test]
    fn test_shipped_against_grn_lists_valid_statuses() {
        let err = check_transition(DocumentKind::Grn, "Received", "Shipped", ActorRole::Vendor)
            .unwrap_err();
        match err {
            StatusError::InvalidStatus { valid, .. } => {
                assert_eq!(valid, &["Received", "Rejected"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_customer_can_cancel_but_not_approve() {
        assert_eq!(
            can_transition(
                DocumentKind::OrderLifecycle,
                "approved",
                "cancelled",
                ActorRole::Customer
            ),
            Ok(true)
        );
        let err = check_transition(
            DocumentKind::OrderLifecycle,
            "pending",
            "approved",
            ActorRole::Customer,
        )
        .unwrap_err();
        assert!(matches!(err, StatusError::NotPermitted { .. }));
    }

    #[test]
    fn test_only_admin_retries_failed_delivery() {
        for role in [ActorRole::Vendor, ActorRole::Customer, ActorRole::Delivery] {
            assert_eq!(
                can_transition(DocumentKind::OrderLifecycle, "failed", "in_transit", role),
                Ok(false)
            );
        }
        assert_eq!(
            can_transition(
                DocumentKind::OrderLifecycle,
                "failed",
                "in_transit",
                ActorRole::Admin
            ),
            Ok(true)
        );
    }

    #[test]
    fn test_two_order_vocabularies_stay_separate() {
        assert!(matches!(
            can_transition(DocumentKind::Order, "Received", "approved", ActorRole::Vendor),
            Err(StatusError::InvalidStatus { .. })
        ));
        assert!(matches!(
            can_transition(
                DocumentKind::OrderLifecycle,
                "pending",
                "Processed",
                ActorRole::Vendor
            ),
            Err(StatusError::InvalidStatus { .. })
        ));
    }
}
