use std::time::Duration;

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::analytics::AppliedChange;
use crate::bus::EventBus;
use crate::config::Config;
use crate::models::driver::DriverRecord;
use crate::models::order::Order;
use crate::models::stats::CourierStats;
use crate::observability::metrics::Metrics;
use crate::tracking::LocationStore;

/// Shared state of the choreography core.
///
/// Each map is keyed by entity id; read-modify-write always goes through
/// the entry API so updates to one key are serialized. A relational
/// deployment replaces these maps with rows and the entry calls with
/// row-level locks; the call shape stays the same.
pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub drivers: DashMap<Uuid, DriverRecord>,
    pub stats: DashMap<Uuid, CourierStats>,
    /// At-least-once dedup marks: (order id, applied change kind).
    pub applied_changes: DashSet<(Uuid, AppliedChange)>,
    pub bus: EventBus,
    pub locations: LocationStore,
    pub name_lookup_timeout: Duration,
    pub delivery_earnings: f64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            orders: DashMap::new(),
            drivers: DashMap::new(),
            stats: DashMap::new(),
            applied_changes: DashSet::new(),
            bus: EventBus::new(config.event_queue_size),
            locations: LocationStore::new(config.broadcast_buffer_size),
            name_lookup_timeout: config.name_lookup_timeout(),
            delivery_earnings: config.delivery_earnings,
            metrics: Metrics::new(),
        }
    }

    /// Serializes `body` and fans it out on the bus.
    ///
    /// The caller's state change is already committed when this runs. A
    /// failed publish is logged and counted, never propagated: the change
    /// stands without its event, and affected consumers simply never see
    /// it. There is no outbox or retry.
    pub fn publish_event<T: serde::Serialize>(&self, routing_key: &str, body: &T) {
        let payload = match serde_json::to_value(body) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(routing_key, error = %err, "failed to serialize event body");
                self.metrics.publish_failures_total.inc();
                return;
            }
        };

        let report = self.bus.publish(routing_key, payload);
        self.metrics
            .events_published_total
            .with_label_values(&[routing_key])
            .inc();
        if report.failed() > 0 {
            self.metrics
                .publish_failures_total
                .inc_by(report.failed() as u64);
        }
    }
}
