//! The order lifecycle state machine. State is committed to the store
//! first; the describing event is published afterwards and is not atomic
//! with the write.

pub mod queries;

use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::envelope::{self, OrderEventBody, PodUploadedBody};
use crate::bus::{Ack, EventEnvelope, Subscription};
use crate::drivers::{self, DriverDirectory};
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_description: String,
}

/// Allocates a PENDING order and publishes `order.created`.
pub fn create_order(state: &AppState, request: NewOrder) -> Order {
    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        customer_id: request.customer_id,
        driver_id: None,
        driver_name: None,
        pickup_address: request.pickup_address,
        delivery_address: request.delivery_address,
        package_description: request.package_description,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
        photo_url: None,
        signature_url: None,
        rating: None,
        feedback: None,
    };

    state.orders.insert(order.id, order.clone());
    publish_order_event(state, envelope::ORDER_CREATED, &order);

    info!(order_id = %order.id, customer_id = %order.customer_id, "order created");
    order
}

/// Moves the order along the lifecycle table. Re-requesting the current
/// status from a non-terminal state is an accepted no-op and does not
/// republish.
pub fn transition(
    state: &AppState,
    order_id: Uuid,
    new_status: OrderStatus,
) -> Result<Order, AppError> {
    let (snapshot, changed) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        validate_transition(order.status, new_status)?;

        if order.status == new_status {
            (order.clone(), false)
        } else {
            order.status = new_status;
            order.updated_at = Utc::now();
            (order.clone(), true)
        }
    };

    if changed {
        state
            .metrics
            .order_transitions_total
            .with_label_values(&[new_status.as_str()])
            .inc();
        publish_order_event(state, envelope::ORDER_UPDATED, &snapshot);
        info!(order_id = %order_id, status = %new_status, "order transitioned");
    }

    Ok(snapshot)
}

fn validate_transition(current: OrderStatus, next: OrderStatus) -> Result<(), AppError> {
    if current.is_terminal() {
        return Err(AppError::Validation(format!(
            "cannot update terminal state {current}"
        )));
    }
    if current.can_transition_to(next) {
        return Ok(());
    }

    let forward = current
        .next_in_flow()
        .map(|status| status.as_str())
        .unwrap_or("nothing");
    Err(AppError::Validation(format!(
        "{current} orders may only move to {forward} or CANCELLED, not {next}"
    )))
}

/// Assigns a driver to a PENDING order.
///
/// The display name comes from a best-effort directory lookup bounded by
/// the configured timeout; on timeout or absence the synthesized
/// placeholder is used and the assignment still succeeds.
pub async fn assign_driver(
    state: &AppState,
    directory: &dyn DriverDirectory,
    order_id: Uuid,
    driver_id: Uuid,
) -> Result<Order, AppError> {
    {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Validation(format!(
                "order must be PENDING to assign a driver, was {}",
                order.status
            )));
        }
    }

    let driver_name = match timeout(state.name_lookup_timeout, directory.display_name(driver_id))
        .await
    {
        Ok(Some(name)) => name,
        Ok(None) => {
            warn!(driver_id = %driver_id, "driver name not found; using placeholder");
            drivers::placeholder_name(driver_id)
        }
        Err(_) => {
            warn!(driver_id = %driver_id, "driver name lookup timed out; using placeholder");
            drivers::placeholder_name(driver_id)
        }
    };

    let snapshot = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        // the status may have moved while the lookup ran
        if order.status != OrderStatus::Pending {
            return Err(AppError::Validation(format!(
                "order must be PENDING to assign a driver, was {}",
                order.status
            )));
        }

        order.driver_id = Some(driver_id);
        order.driver_name = Some(driver_name);
        order.status = OrderStatus::Assigned;
        order.updated_at = Utc::now();
        order.clone()
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[OrderStatus::Assigned.as_str()])
        .inc();
    publish_order_event(state, envelope::ORDER_UPDATED, &snapshot);

    info!(
        order_id = %order_id,
        driver_id = %driver_id,
        driver_name = %snapshot.driver_name.as_deref().unwrap_or(""),
        "driver assigned"
    );
    Ok(snapshot)
}

/// Records proof of delivery and forces DELIVERED from any non-terminal
/// state; physical proof is definitive, so this is the one transition
/// that bypasses the table. Reapplying to a DELIVERED order is a no-op.
pub fn record_proof_of_delivery(
    state: &AppState,
    order_id: Uuid,
    photo_url: String,
    signature_url: String,
) -> Result<Order, AppError> {
    let (snapshot, changed) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status == OrderStatus::Cancelled {
            return Err(AppError::Validation(
                "cannot update terminal state CANCELLED".to_string(),
            ));
        }
        if order.status == OrderStatus::Delivered {
            (order.clone(), false)
        } else {
            order.photo_url = Some(photo_url);
            order.signature_url = Some(signature_url);
            order.status = OrderStatus::Delivered;
            order.updated_at = Utc::now();
            (order.clone(), true)
        }
    };

    if changed {
        state
            .metrics
            .order_transitions_total
            .with_label_values(&[OrderStatus::Delivered.as_str()])
            .inc();
        publish_order_event(state, envelope::ORDER_UPDATED, &snapshot);
        info!(order_id = %order_id, "proof of delivery recorded");
    }

    Ok(snapshot)
}

/// One rating per order, only after delivery, only by the owning
/// customer. Publishes `order.rated`.
pub fn rate_order(
    state: &AppState,
    order_id: Uuid,
    rating: u8,
    feedback: Option<String>,
    requester_id: Uuid,
) -> Result<Order, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let snapshot = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.customer_id != requester_id {
            return Err(AppError::Validation(
                "you can only rate your own orders".to_string(),
            ));
        }
        if order.status != OrderStatus::Delivered {
            return Err(AppError::Validation(
                "order must be DELIVERED to be rated".to_string(),
            ));
        }
        if order.rating.is_some() {
            return Err(AppError::Validation("order is already rated".to_string()));
        }

        order.rating = Some(rating);
        order.feedback = feedback;
        order.updated_at = Utc::now();
        order.clone()
    };

    publish_order_event(state, envelope::ORDER_RATED, &snapshot);
    info!(order_id = %order_id, rating, "order rated");
    Ok(snapshot)
}

fn publish_order_event(state: &AppState, routing_key: &str, order: &Order) {
    state.publish_event(routing_key, &OrderEventBody::from(order));
}

/// Applies an `order.pod.uploaded` event from the proof-of-delivery
/// collaborator.
pub fn apply_pod_event(state: &AppState, event: &EventEnvelope) -> Ack {
    if event.routing_key != envelope::ORDER_POD_UPLOADED {
        return Ack::Skipped;
    }

    let body: PodUploadedBody = match serde_json::from_value(event.payload.clone()) {
        Ok(body) => body,
        Err(err) => {
            warn!(routing_key = %event.routing_key, error = %err, "malformed pod event");
            return Ack::Skipped;
        }
    };

    match record_proof_of_delivery(state, body.order_id, body.photo_url, body.signature_url) {
        Ok(_) => Ack::Applied,
        Err(err) => {
            warn!(order_id = %body.order_id, error = %err, "pod event not applied");
            Ack::Skipped
        }
    }
}

/// Consumer task bound to `order.pod.uploaded`.
pub async fn run_pod_consumer(state: Arc<AppState>, mut subscription: Subscription) {
    info!(queue = subscription.queue(), "pod consumer started");

    while let Some(event) = subscription.recv().await {
        let ack = apply_pod_event(&state, &event);
        state
            .metrics
            .consumer_events_total
            .with_label_values(&["pod", ack.as_label()])
            .inc();
    }

    warn!("pod consumer stopped: queue closed");
}
