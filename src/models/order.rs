use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a delivery order.
///
/// ```text
/// PENDING ──► ASSIGNED ──► PICKED_UP ──► DELIVERED
///    │            │             │
///    └────────────┴─────────────┴──► CANCELLED
/// ```
///
/// DELIVERED and CANCELLED are terminal. Re-requesting the current status
/// is accepted as a no-op from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The single forward step in the delivery flow, if any.
    pub fn next_in_flow(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Assigned),
            OrderStatus::Assigned => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// True if `next` is a legal transition target from this status.
    ///
    /// Same-status re-application counts as legal from non-terminal states;
    /// CANCELLED is reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == *self || next == OrderStatus::Cancelled {
            return true;
        }
        self.next_in_flow() == Some(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// None until a driver is assigned; immutable afterwards.
    pub driver_id: Option<Uuid>,
    /// Denormalized snapshot taken at assignment time.
    pub driver_name: Option<String>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_description: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub photo_url: Option<String>,
    pub signature_url: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::PickedUp,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn forward_flow_is_linear() {
        assert_eq!(
            OrderStatus::Pending.next_in_flow(),
            Some(OrderStatus::Assigned)
        );
        assert_eq!(
            OrderStatus::Assigned.next_in_flow(),
            Some(OrderStatus::PickedUp)
        );
        assert_eq!(
            OrderStatus::PickedUp.next_in_flow(),
            Some(OrderStatus::Delivered)
        );
        assert_eq!(OrderStatus::Delivered.next_in_flow(), None);
        assert_eq!(OrderStatus::Cancelled.next_in_flow(), None);
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for next in ALL {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn every_non_terminal_state_can_cancel() {
        for current in [
            OrderStatus::Pending,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
        ] {
            assert!(current.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn same_status_is_legal_outside_terminal() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
        assert!(OrderStatus::Assigned.can_transition_to(OrderStatus::Assigned));
        assert!(OrderStatus::PickedUp.can_transition_to(OrderStatus::PickedUp));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::PickedUp));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Assigned.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::PickedUp.can_transition_to(OrderStatus::Assigned));
    }

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PickedUp).unwrap();
        assert_eq!(json, "\"PICKED_UP\"");
        let back: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(back, OrderStatus::Cancelled);
    }
}
