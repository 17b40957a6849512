//! logbus-listener: consumes log events from the `logs_topic` exchange and
//! forwards them to the log-persistence service.
//!
//! ## Architecture
//! ```text
//! [Producers] -> [logs_topic exchange] -> [ephemeral queue] -> [worker pool] -> [log service]
//! ```
//!
//! ## Configuration
//! - LOGBUS__AMQP__URL: RabbitMQ connection string
//! - LOGBUS__SINK__URL: log service endpoint
//! - LOGBUS__CONSUMER__TOPICS: routing-key patterns to bind
//! - LOGBUS_LOG: tracing filter (default: info)

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logbus::config::{Config, LOG_ENV_VAR};
use logbus::connection;
use logbus::{Consumer, HttpLogSink, SinkHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting logbus-listener");

    let connection = Arc::new(connection::connect(&config.amqp.url).await?);

    let sink = Arc::new(HttpLogSink::new(&config.sink.url));
    let handler = Arc::new(SinkHandler::new(sink));
    let consumer = Consumer::new(connection, handler, config.consumer.dispatch()).await?;

    consumer.listen(&config.consumer.topics).await?;
    Ok(())
}
