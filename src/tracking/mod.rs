//! Live driver positions: a last-known-state index plus ephemeral
//! broadcast. The broadcast side is fire-and-forget with no queueing or
//! replay. A subscriber that disconnects or lags misses intervening
//! updates and polls [`LocationStore::position`] on reconnect.

use chrono::Utc;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::geo;
use crate::models::location::{GeoPoint, LocationRecord, LocationUpdate};
use crate::state::AppState;

pub struct LocationStore {
    index: DashMap<Uuid, LocationRecord>,
    admin_tx: broadcast::Sender<LocationUpdate>,
    order_channels: DashMap<Uuid, broadcast::Sender<LocationUpdate>>,
    buffer_size: usize,
}

impl LocationStore {
    pub fn new(buffer_size: usize) -> Self {
        let (admin_tx, _) = broadcast::channel(buffer_size);
        Self {
            index: DashMap::new(),
            admin_tx,
            order_channels: DashMap::new(),
            buffer_size,
        }
    }

    /// Upserts the driver's position (last write wins, even if the update
    /// arrived out of order), then broadcasts on the admin channel and,
    /// when an active order is attached, on that order's channel.
    pub fn update_location(&self, update: LocationUpdate) -> LocationRecord {
        let record = LocationRecord {
            driver_id: update.driver_id,
            position: update.position(),
            active_order_id: update.order_id,
            observed_at: Utc::now(),
        };
        self.index.insert(update.driver_id, record.clone());

        let _ = self.admin_tx.send(update.clone());

        if let Some(order_id) = update.order_id {
            if let Some(tx) = self.order_channels.get(&order_id) {
                if tx.send(update).is_err() {
                    // nobody listening anymore; drop the channel
                    drop(tx);
                    self.order_channels
                        .remove_if(&order_id, |_, tx| tx.receiver_count() == 0);
                }
            }
        }

        record
    }

    /// Synchronous read path for profile and listing queries.
    pub fn position(&self, driver_id: Uuid) -> Option<LocationRecord> {
        self.index.get(&driver_id).map(|entry| entry.value().clone())
    }

    /// Drivers within `radius_km` of `origin`, closest first.
    pub fn nearest_within(&self, origin: &GeoPoint, radius_km: f64, limit: usize) -> Vec<(Uuid, f64)> {
        let candidates: Vec<(Uuid, GeoPoint)> = self
            .index
            .iter()
            .map(|entry| (*entry.key(), entry.value().position))
            .collect();
        geo::nearest_within(origin, candidates, radius_km, limit)
    }

    /// Every driver's updates, for the admin map.
    pub fn subscribe_admin(&self) -> broadcast::Receiver<LocationUpdate> {
        self.admin_tx.subscribe()
    }

    /// Updates scoped to one order, for customer tracking. The channel is
    /// created on first subscribe and reclaimed once nobody listens.
    pub fn subscribe_order(&self, order_id: Uuid) -> broadcast::Receiver<LocationUpdate> {
        self.order_channels
            .entry(order_id)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Admin channel as a stream; lagged gaps are skipped silently.
    pub fn admin_stream(&self) -> impl Stream<Item = LocationUpdate> + Send {
        into_update_stream(self.subscribe_admin())
    }

    pub fn order_stream(&self, order_id: Uuid) -> impl Stream<Item = LocationUpdate> + Send {
        into_update_stream(self.subscribe_order(order_id))
    }
}

/// Command-surface entry point: accepts a driver's GPS fix, updates the
/// index, fans out, and counts the update.
pub fn record_location(state: &AppState, update: LocationUpdate) -> LocationRecord {
    let record = state.locations.update_location(update);
    state.metrics.location_updates_total.inc();
    record
}

fn into_update_stream(
    rx: broadcast::Receiver<LocationUpdate>,
) -> impl Stream<Item = LocationUpdate> + Send {
    BroadcastStream::new(rx).filter_map(|item| futures::future::ready(item.ok()))
}
