use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::driver::{DriverRecord, DriverStatus};
use crate::models::order::{Order, OrderStatus};

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_UPDATED: &str = "order.updated";
pub const ORDER_RATED: &str = "order.rated";
pub const ORDER_POD_UPLOADED: &str = "order.pod.uploaded";
pub const DRIVER_STATUS_CHANGED: &str = "driver.status.changed";

/// One message on the bus. Exists only in flight; nothing persists it.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub routing_key: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(routing_key: impl Into<String>, payload: Value) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Body of every `order.*` event. Consumers deserialize leniently:
/// unknown fields are ignored and optional fields tolerate absence, so
/// producers can grow the payload without breaking old consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventBody {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl From<&Order> for OrderEventBody {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_id: order.customer_id,
            driver_id: order.driver_id,
            driver_name: order.driver_name.clone(),
            status: order.status,
            rating: order.rating,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatusBody {
    pub driver_id: Uuid,
    pub status: DriverStatus,
}

impl From<&DriverRecord> for DriverStatusBody {
    fn from(record: &DriverRecord) -> Self {
        Self {
            driver_id: record.driver_id,
            status: record.status,
        }
    }
}

/// Published by the proof-of-delivery collaborator once photo and
/// signature objects are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodUploadedBody {
    pub order_id: Uuid,
    pub photo_url: String,
    pub signature_url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_body_ignores_unknown_fields() {
        let raw = json!({
            "orderId": Uuid::new_v4(),
            "customerId": Uuid::new_v4(),
            "status": "PENDING",
            "somethingNewerConsumersKnowAbout": true,
        });

        let body: OrderEventBody = serde_json::from_value(raw).unwrap();
        assert_eq!(body.status, OrderStatus::Pending);
        assert!(body.driver_id.is_none());
        assert!(body.rating.is_none());
    }

    #[test]
    fn order_body_omits_absent_optionals() {
        let body = OrderEventBody {
            order_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            driver_id: None,
            driver_name: None,
            status: OrderStatus::Pending,
            rating: None,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("driverId").is_none());
        assert!(value.get("rating").is_none());
        assert_eq!(value["status"], "PENDING");
    }
}
