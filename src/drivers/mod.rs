//! Driver status coordination: profile registration, availability
//! changes, display-name resolution for order assignment, and the
//! consumer that keeps availability in sync with the order lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::envelope::{self, DriverStatusBody, OrderEventBody};
use crate::bus::{Ack, EventEnvelope, Subscription};
use crate::error::AppError;
use crate::models::driver::{DriverRecord, DriverStatus};
use crate::models::location::LocationRecord;
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Name lookup seam used by order assignment. Absence is a normal return
/// value; implementations must not error, and the caller applies its own
/// timeout on top.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn display_name(&self, driver_id: Uuid) -> Option<String>;
}

/// Directory backed by the coordinator's own records.
pub struct CoordinatorDirectory {
    state: Arc<AppState>,
}

impl CoordinatorDirectory {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl DriverDirectory for CoordinatorDirectory {
    async fn display_name(&self, driver_id: Uuid) -> Option<String> {
        resolve_display_name(&self.state, driver_id)
    }
}

pub fn resolve_display_name(state: &AppState, driver_id: Uuid) -> Option<String> {
    state
        .drivers
        .get(&driver_id)
        .map(|record| record.full_name.clone())
}

/// Synthesized display name used whenever the real one cannot be
/// resolved in time.
pub fn placeholder_name(driver_id: Uuid) -> String {
    format!("Driver {}", &driver_id.to_string()[..8])
}

/// A driver joined with the last-known position from the location index.
#[derive(Debug, Clone, Serialize)]
pub struct DriverProfile {
    #[serde(flatten)]
    pub record: DriverRecord,
    pub last_position: Option<LocationRecord>,
}

pub fn register_driver(
    state: &AppState,
    driver_id: Uuid,
    full_name: Option<String>,
    vehicle_type: Option<String>,
    license_plate: Option<String>,
) -> Result<DriverRecord, AppError> {
    if state.drivers.contains_key(&driver_id) {
        return Err(AppError::Validation(format!(
            "driver profile already exists for {driver_id}"
        )));
    }

    let record = DriverRecord {
        driver_id,
        full_name: full_name.unwrap_or_else(|| placeholder_name(driver_id)),
        vehicle_type,
        license_plate,
        status: DriverStatus::Offline,
        last_updated: Utc::now(),
    };
    state.drivers.insert(driver_id, record.clone());

    info!(driver_id = %driver_id, name = %record.full_name, "driver registered");
    Ok(record)
}

/// Persists the new availability and always publishes
/// `driver.status.changed`; any status may follow any other.
pub fn set_status(
    state: &AppState,
    driver_id: Uuid,
    status: DriverStatus,
) -> Result<DriverRecord, AppError> {
    let snapshot = {
        let mut record = state
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
        record.status = status;
        record.last_updated = Utc::now();
        record.clone()
    };

    state.publish_event(
        envelope::DRIVER_STATUS_CHANGED,
        &DriverStatusBody::from(&snapshot),
    );
    info!(driver_id = %driver_id, status = %status, "driver status updated");
    Ok(snapshot)
}

pub fn driver_profile(state: &AppState, driver_id: Uuid) -> Result<DriverProfile, AppError> {
    let record = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    Ok(DriverProfile {
        last_position: state.locations.position(driver_id),
        record,
    })
}

pub fn list_drivers(state: &AppState) -> Vec<DriverProfile> {
    state
        .drivers
        .iter()
        .map(|entry| DriverProfile {
            last_position: state.locations.position(*entry.key()),
            record: entry.value().clone(),
        })
        .collect()
}

/// Maps an order lifecycle event to the driver's availability:
/// ASSIGNED/PICKED_UP mark the driver busy, DELIVERED/CANCELLED bring the
/// driver back online. Safe under redelivery since the write is
/// last-write-wins.
pub fn apply_order_event(state: &AppState, event: &EventEnvelope) -> Ack {
    if event.routing_key != envelope::ORDER_UPDATED {
        return Ack::Skipped;
    }

    let body: OrderEventBody = match serde_json::from_value(event.payload.clone()) {
        Ok(body) => body,
        Err(err) => {
            warn!(routing_key = %event.routing_key, error = %err, "malformed order event");
            return Ack::Skipped;
        }
    };

    let Some(driver_id) = body.driver_id else {
        return Ack::Skipped;
    };

    let target = match body.status {
        OrderStatus::Assigned | OrderStatus::PickedUp => DriverStatus::Busy,
        OrderStatus::Delivered | OrderStatus::Cancelled => DriverStatus::Online,
        OrderStatus::Pending => return Ack::Skipped,
    };

    match set_status(state, driver_id, target) {
        Ok(_) => Ack::Applied,
        Err(AppError::NotFound(_)) => {
            debug!(driver_id = %driver_id, "order event for unregistered driver; skipping");
            Ack::Skipped
        }
        Err(err) => {
            warn!(driver_id = %driver_id, error = %err, "driver status sync failed");
            Ack::Skipped
        }
    }
}

/// Consumer task bound to `order.updated`.
pub async fn run_driver_status_sync(state: Arc<AppState>, mut subscription: Subscription) {
    info!(queue = subscription.queue(), "driver status sync started");

    while let Some(event) = subscription.recv().await {
        let ack = apply_order_event(&state, &event);
        state
            .metrics
            .consumer_events_total
            .with_label_values(&["driver_status_sync", ack.as_label()])
            .inc();
    }

    warn!("driver status sync stopped: queue closed");
}
