//! Exchange and queue provisioning.
//!
//! Both declarations are idempotent on the broker side: any number of
//! emitter and consumer processes may issue them concurrently against a
//! shared broker without error, as long as the parameters match.

use lapin::{
    options::{ExchangeDeclareOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, ExchangeKind, Queue,
};

use crate::error::{BusError, Result};

/// Topic exchange carrying all log events.
pub const LOGS_EXCHANGE: &str = "logs_topic";

/// Declare the durable `logs_topic` topic exchange.
///
/// Failure (e.g. an existing exchange of the same name with different
/// parameters) is fatal to the caller's setup path.
pub async fn declare_exchange(channel: &Channel) -> Result<()> {
    channel
        .exchange_declare(
            LOGS_EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Connection(format!("Failed to declare exchange: {}", e)))
}

/// Declare a broker-named queue private to this consumer.
///
/// Non-durable, exclusive to the declaring connection, and auto-deleted
/// when that connection closes; the broker discards any messages still
/// bound only to it.
pub async fn declare_ephemeral_queue(channel: &Channel) -> Result<Queue> {
    channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))
}
