use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub event_queue_size: usize,
    pub broadcast_buffer_size: usize,
    pub name_lookup_timeout_ms: u64,
    pub delivery_earnings: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            event_queue_size: 1024,
            broadcast_buffer_size: 256,
            name_lookup_timeout_ms: 500,
            delivery_earnings: 15.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_queue_size: parse_or_default("EVENT_QUEUE_SIZE", defaults.event_queue_size)?,
            broadcast_buffer_size: parse_or_default(
                "BROADCAST_BUFFER_SIZE",
                defaults.broadcast_buffer_size,
            )?,
            name_lookup_timeout_ms: parse_or_default(
                "NAME_LOOKUP_TIMEOUT_MS",
                defaults.name_lookup_timeout_ms,
            )?,
            delivery_earnings: parse_or_default("DELIVERY_EARNINGS", defaults.delivery_earnings)?,
        })
    }

    pub fn name_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.name_lookup_timeout_ms)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
