//! Broker connection helper.
//!
//! The emitter and consumer take an already-established connection; this
//! is the convenience the hosting process uses to establish it. The broker
//! is usually the last container up in a fresh deployment, so the dial is
//! retried with exponential backoff before giving up.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use lapin::{Connection, ConnectionProperties};
use tracing::{info, warn};

use crate::error::{BusError, Result};

const MAX_ATTEMPTS: usize = 5;

/// Connect to the broker, retrying with exponential backoff and jitter.
pub async fn connect(url: &str) -> Result<Connection> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(MAX_ATTEMPTS)
        .with_jitter()
        .build();

    let mut last_error = None;

    for (attempt, delay) in std::iter::once(Duration::ZERO).chain(backoff).enumerate() {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
        }

        match Connection::connect(url, ConnectionProperties::default()).await {
            Ok(connection) => {
                info!("Connected to broker");
                return Ok(connection);
            }
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    error = %e,
                    "Broker not ready, backing off"
                );
                last_error = Some(e);
            }
        }
    }

    Err(BusError::Connection(format!(
        "Failed to connect to broker: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
