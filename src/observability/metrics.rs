use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub events_published_total: IntCounterVec,
    pub publish_failures_total: IntCounter,
    pub order_transitions_total: IntCounterVec,
    pub consumer_events_total: IntCounterVec,
    pub location_updates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Events published by routing key"),
            &["routing_key"],
        )
        .expect("valid events_published_total metric");

        let publish_failures_total = IntCounter::new(
            "publish_failures_total",
            "Publishes that failed to reach a matched queue",
        )
        .expect("valid publish_failures_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order transitions by target status"),
            &["to_status"],
        )
        .expect("valid order_transitions_total metric");

        let consumer_events_total = IntCounterVec::new(
            Opts::new("consumer_events_total", "Consumed events by consumer and outcome"),
            &["consumer", "outcome"],
        )
        .expect("valid consumer_events_total metric");

        let location_updates_total = IntCounter::new(
            "location_updates_total",
            "GPS fixes accepted into the location index",
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(publish_failures_total.clone()))
            .expect("register publish_failures_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(consumer_events_total.clone()))
            .expect("register consumer_events_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            events_published_total,
            publish_failures_total,
            order_transitions_total,
            consumer_events_total,
            location_updates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
