use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_core::config::Config;
use courier_core::error::AppError;
use courier_core::state::AppState;
use courier_core::{analytics, drivers, orders};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let shared_state = Arc::new(AppState::new(&config));

    let analytics_queue = shared_state
        .bus
        .bind("analytics.order.events", &["order.#"]);
    let sync_queue = shared_state
        .bus
        .bind("driver.status.sync", &["order.updated"]);
    let pod_queue = shared_state
        .bus
        .bind("order.pod.queue", &["order.pod.uploaded"]);

    tokio::spawn(analytics::run_analytics_aggregator(
        shared_state.clone(),
        analytics_queue,
    ));
    tokio::spawn(drivers::run_driver_status_sync(
        shared_state.clone(),
        sync_queue,
    ));
    tokio::spawn(orders::run_pod_consumer(shared_state.clone(), pod_queue));

    tracing::info!("courier core started");

    shutdown_signal().await;
    tracing::info!("shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
