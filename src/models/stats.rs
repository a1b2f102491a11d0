use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-driver running aggregate maintained by the analytics consumer.
///
/// The rating average is carried incrementally; no rating history is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierStats {
    pub driver_id: Uuid,
    pub total_deliveries: u64,
    pub average_rating: f64,
    pub total_ratings_count: u64,
    pub total_earnings: f64,
    pub last_updated: DateTime<Utc>,
}

impl CourierStats {
    pub fn new(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            total_deliveries: 0,
            average_rating: 0.0,
            total_ratings_count: 0,
            total_earnings: 0.0,
            last_updated: Utc::now(),
        }
    }

    pub fn record_delivery(&mut self, earnings: f64) {
        self.total_deliveries += 1;
        self.total_earnings += earnings;
        self.last_updated = Utc::now();
    }

    pub fn record_rating(&mut self, rating: u8) {
        let count = self.total_ratings_count as f64;
        self.average_rating = (self.average_rating * count + f64::from(rating)) / (count + 1.0);
        self.total_ratings_count += 1;
        self.last_updated = Utc::now();
    }
}
