//! In-process topic exchange.
//!
//! Queues are bounded mpsc channels bound to the exchange with
//! dot-segmented patterns: `*` matches exactly one segment, `#` matches
//! zero or more trailing segments. Delivery is at-least-once from the
//! consumer's point of view and per-queue FIFO from a single producer;
//! there is no ordering across queues. A full or closed queue makes the
//! publish fail for that queue only: the failure is logged and counted,
//! and the caller's already-committed state change stands.

pub mod envelope;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

pub use envelope::EventEnvelope;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Rest,
}

/// A parsed binding pattern. `#` is only meaningful as the final segment.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('.')
            .map(|part| match part {
                "*" => Segment::Single,
                "#" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        let key: Vec<&str> = routing_key.split('.').collect();
        let mut pos = 0;

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if pos >= key.len() {
                        return false;
                    }
                    pos += 1;
                }
                Segment::Literal(literal) => {
                    if key.get(pos) != Some(&literal.as_str()) {
                        return false;
                    }
                    pos += 1;
                }
            }
        }

        pos == key.len()
    }
}

struct Binding {
    patterns: Vec<TopicPattern>,
    tx: mpsc::Sender<EventEnvelope>,
}

/// Outcome of one consumer handling one envelope. Skipped covers unknown
/// routing keys, malformed payloads, and idempotent re-deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Applied,
    Skipped,
}

impl Ack {
    pub fn as_label(&self) -> &'static str {
        match self {
            Ack::Applied => "applied",
            Ack::Skipped => "skipped",
        }
    }
}

/// How a single publish fanned out across bound queues.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishReport {
    pub matched: usize,
    pub delivered: usize,
}

impl PublishReport {
    pub fn failed(&self) -> usize {
        self.matched - self.delivered
    }
}

/// A consumer's end of a bound queue.
pub struct Subscription {
    queue: String,
    rx: mpsc::Receiver<EventEnvelope>,
}

impl Subscription {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next event in publish order, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.rx.try_recv().ok()
    }
}

pub struct EventBus {
    bindings: DashMap<String, Binding>,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            bindings: DashMap::new(),
            queue_capacity,
        }
    }

    /// Creates (or replaces) the named queue and binds it to `patterns`.
    pub fn bind(&self, queue: &str, patterns: &[&str]) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let binding = Binding {
            patterns: patterns.iter().map(|p| TopicPattern::parse(p)).collect(),
            tx,
        };
        self.bindings.insert(queue.to_string(), binding);

        Subscription {
            queue: queue.to_string(),
            rx,
        }
    }

    pub fn unbind(&self, queue: &str) {
        self.bindings.remove(queue);
    }

    /// Routes one envelope to every queue whose binding matches the key.
    ///
    /// Uses `try_send` so a slow consumer can never block a producer; the
    /// envelope is simply lost for that queue.
    pub fn publish(&self, routing_key: &str, payload: Value) -> PublishReport {
        let envelope = EventEnvelope::new(routing_key, payload);
        let mut report = PublishReport::default();

        for entry in self.bindings.iter() {
            let (queue, binding) = entry.pair();
            if !binding.patterns.iter().any(|p| p.matches(routing_key)) {
                continue;
            }

            report.matched += 1;
            match binding.tx.try_send(envelope.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(queue = %queue, routing_key, error = %err, "event publish failed");
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_patterns_match_exactly() {
        let pattern = TopicPattern::parse("order.created");
        assert!(pattern.matches("order.created"));
        assert!(!pattern.matches("order.updated"));
        assert!(!pattern.matches("order.created.extra"));
        assert!(!pattern.matches("order"));
    }

    #[test]
    fn star_matches_exactly_one_segment() {
        let pattern = TopicPattern::parse("order.*");
        assert!(pattern.matches("order.created"));
        assert!(pattern.matches("order.rated"));
        assert!(!pattern.matches("order.pod.uploaded"));
        assert!(!pattern.matches("order"));

        let middle = TopicPattern::parse("order.*.uploaded");
        assert!(middle.matches("order.pod.uploaded"));
        assert!(!middle.matches("order.uploaded"));
    }

    #[test]
    fn hash_matches_zero_or_more_trailing_segments() {
        let pattern = TopicPattern::parse("order.#");
        assert!(pattern.matches("order.created"));
        assert!(pattern.matches("order.pod.uploaded"));
        assert!(pattern.matches("order"));
        assert!(!pattern.matches("driver.status.changed"));
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_queues() {
        let bus = EventBus::new(8);
        let mut orders = bus.bind("orders", &["order.#"]);
        let mut drivers = bus.bind("drivers", &["driver.status.changed"]);

        let report = bus.publish("order.created", json!({"n": 1}));
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);

        assert_eq!(orders.recv().await.unwrap().routing_key, "order.created");
        assert!(drivers.try_recv().is_none());
    }

    #[tokio::test]
    async fn queue_preserves_publish_order() {
        let bus = EventBus::new(8);
        let mut sub = bus.bind("all", &["order.#"]);

        for key in ["order.created", "order.updated", "order.rated"] {
            bus.publish(key, json!({}));
        }

        assert_eq!(sub.recv().await.unwrap().routing_key, "order.created");
        assert_eq!(sub.recv().await.unwrap().routing_key, "order.updated");
        assert_eq!(sub.recv().await.unwrap().routing_key, "order.rated");
    }

    #[tokio::test]
    async fn full_queue_is_a_per_queue_failure() {
        let bus = EventBus::new(1);
        let _sub = bus.bind("slow", &["order.#"]);

        let first = bus.publish("order.created", json!({}));
        assert_eq!(first.delivered, 1);

        let second = bus.publish("order.updated", json!({}));
        assert_eq!(second.matched, 1);
        assert_eq!(second.delivered, 0);
        assert_eq!(second.failed(), 1);
    }

    #[tokio::test]
    async fn multiple_patterns_on_one_queue_deliver_once() {
        let bus = EventBus::new(8);
        let mut sub = bus.bind("mixed", &["order.rated", "order.*"]);

        let report = bus.publish("order.rated", json!({}));
        assert_eq!(report.delivered, 1);
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }
}
