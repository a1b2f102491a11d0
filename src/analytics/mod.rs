//! Rating and earnings aggregation over the order event stream.
//!
//! The aggregator is a plain consumer: it owns the `CourierStats` rows
//! and nothing else writes them. Updates run through the entry API so the
//! read-modify-write for one driver is serialized even with several
//! worker tasks draining the queue. Redelivered events are no-ops thanks
//! to the (order id, change kind) dedup marks.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::envelope::{self, OrderEventBody};
use crate::bus::{Ack, EventEnvelope, Subscription};
use crate::models::order::OrderStatus;
use crate::models::stats::CourierStats;
use crate::state::AppState;

/// Which aggregate change an order event has already produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppliedChange {
    Delivery,
    Rating,
}

/// Routes one order event into the stats. Unknown routing keys, malformed
/// payloads, and events without a driver are skipped.
pub fn apply_order_event(state: &AppState, event: &EventEnvelope) -> Ack {
    let body: OrderEventBody = match event.routing_key.as_str() {
        envelope::ORDER_UPDATED | envelope::ORDER_RATED => {
            match serde_json::from_value(event.payload.clone()) {
                Ok(body) => body,
                Err(err) => {
                    warn!(routing_key = %event.routing_key, error = %err, "malformed order event");
                    return Ack::Skipped;
                }
            }
        }
        _ => return Ack::Skipped,
    };

    let Some(driver_id) = body.driver_id else {
        return Ack::Skipped;
    };

    match event.routing_key.as_str() {
        envelope::ORDER_UPDATED if body.status == OrderStatus::Delivered => {
            record_delivery(state, body.order_id, driver_id)
        }
        envelope::ORDER_RATED => match body.rating {
            Some(rating) => record_rating(state, body.order_id, driver_id, rating),
            None => Ack::Skipped,
        },
        _ => Ack::Skipped,
    }
}

fn record_delivery(state: &AppState, order_id: Uuid, driver_id: Uuid) -> Ack {
    if !state.applied_changes.insert((order_id, AppliedChange::Delivery)) {
        return Ack::Skipped;
    }

    let totals = {
        let mut stats = state
            .stats
            .entry(driver_id)
            .or_insert_with(|| CourierStats::new(driver_id));
        stats.record_delivery(state.delivery_earnings);
        (stats.total_deliveries, stats.total_earnings)
    };

    info!(
        driver_id = %driver_id,
        total_deliveries = totals.0,
        total_earnings = totals.1,
        "delivery recorded"
    );
    Ack::Applied
}

fn record_rating(state: &AppState, order_id: Uuid, driver_id: Uuid, rating: u8) -> Ack {
    if !state.applied_changes.insert((order_id, AppliedChange::Rating)) {
        return Ack::Skipped;
    }

    let average = {
        let mut stats = state
            .stats
            .entry(driver_id)
            .or_insert_with(|| CourierStats::new(driver_id));
        stats.record_rating(rating);
        stats.average_rating
    };

    info!(driver_id = %driver_id, rating, average_rating = average, "rating recorded");
    Ack::Applied
}

/// Stats read path; `None` until the first event for the driver arrives.
pub fn stats_for(state: &AppState, driver_id: Uuid) -> Option<CourierStats> {
    state.stats.get(&driver_id).map(|entry| entry.value().clone())
}

/// Consumer task bound to `order.#`.
pub async fn run_analytics_aggregator(state: Arc<AppState>, mut subscription: Subscription) {
    info!(queue = subscription.queue(), "analytics aggregator started");

    while let Some(event) = subscription.recv().await {
        let ack = apply_order_event(&state, &event);
        state
            .metrics
            .consumer_events_total
            .with_label_values(&["analytics", ack.as_label()])
            .inc();
    }

    warn!("analytics aggregator stopped: queue closed");
}
