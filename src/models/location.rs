use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A GPS fix pushed by a driver's device, as carried on the broadcast
/// channels. `order_id` is present while the driver works an active order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
}

impl LocationUpdate {
    pub fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Last-known position held in the geospatial index. Last write wins per
/// driver; no history is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub driver_id: Uuid,
    pub position: GeoPoint,
    pub active_order_id: Option<Uuid>,
    pub observed_at: DateTime<Utc>,
}
