//! Read-side queries over the order store. Role dispatch is a closed
//! enum resolved to a scope value, so each role's visibility is a
//! compile-checked match arm rather than a string comparison.

use serde::Serialize;
use uuid::Uuid;

use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Driver,
    Customer,
}

impl Role {
    /// The subset of orders this role may see, for `user_id`.
    pub fn scope(&self, user_id: Uuid) -> OrderScope {
        match self {
            Role::Admin => OrderScope::All,
            Role::Driver => OrderScope::ByDriver(user_id),
            Role::Customer => OrderScope::ByCustomer(user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    ByDriver(Uuid),
    ByCustomer(Uuid),
}

impl OrderScope {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::ByDriver(driver_id) => order.driver_id == Some(*driver_id),
            OrderScope::ByCustomer(customer_id) => order.customer_id == *customer_id,
        }
    }
}

/// Orders visible to the role, newest first.
pub fn list_orders(state: &AppState, role: Role, user_id: Uuid) -> Vec<Order> {
    let scope = role.scope(user_id);
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| scope.matches(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// Unassigned orders a driver could pick up.
pub fn available_orders(state: &AppState) -> Vec<Order> {
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| entry.value().status == OrderStatus::Pending)
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// Most recently touched orders visible to the role.
pub fn recent_activity(state: &AppState, role: Role, user_id: Uuid, limit: usize) -> Vec<Order> {
    let scope = role.scope(user_id);
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| scope.matches(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    orders.truncate(limit);
    orders
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub assigned: u64,
    pub picked_up: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub total: u64,
}

/// Per-status totals within the role's scope.
pub fn status_counts(state: &AppState, role: Role, user_id: Uuid) -> StatusCounts {
    let scope = role.scope(user_id);
    let mut counts = StatusCounts::default();

    for entry in state.orders.iter() {
        let order = entry.value();
        if !scope.matches(order) {
            continue;
        }
        match order.status {
            OrderStatus::Pending => counts.pending += 1,
            OrderStatus::Assigned => counts.assigned += 1,
            OrderStatus::PickedUp => counts.picked_up += 1,
            OrderStatus::Delivered => counts.delivered += 1,
            OrderStatus::Cancelled => counts.cancelled += 1,
        }
        counts.total += 1;
    }

    counts
}
