//! Event emitter: the publish side of the log exchange.

use std::sync::Arc;

use lapin::{options::BasicPublishOptions, BasicProperties, Channel, Connection};
use tracing::debug;

use crate::error::{BusError, Result};
use crate::payload::Payload;
use crate::topology::{self, LOGS_EXCHANGE};

/// Publishes serialized events to the `logs_topic` exchange.
///
/// Holds a shared long-lived broker connection and opens a cheap,
/// short-lived channel per publish. Every push is an at-most-once attempt:
/// no retry, no publisher-confirm wait; retry policy belongs to the caller.
pub struct Emitter {
    connection: Arc<Connection>,
}

impl Emitter {
    /// Create an emitter over a shared connection, declaring the exchange
    /// up front so the first push cannot race broker provisioning.
    pub async fn new(connection: Arc<Connection>) -> Result<Self> {
        let channel = create_channel(&connection).await?;
        let declared = topology::declare_exchange(&channel).await;
        release_channel(channel).await;
        declared?;

        Ok(Self { connection })
    }

    /// Publish a raw event body under a routing key.
    ///
    /// The exchange is re-declared defensively before publishing; declare
    /// and publish failures share one error channel and callers must not
    /// discriminate between them. The per-push channel is released whether
    /// or not the publish succeeded.
    pub async fn push(&self, body: &str, routing_key: &str) -> Result<()> {
        let channel = create_channel(&self.connection).await?;
        let published = publish(&channel, body, routing_key).await;
        release_channel(channel).await;
        published
    }

    /// Serialize a named event and publish it under a routing key.
    pub async fn push_event(&self, name: &str, data: &str, routing_key: &str) -> Result<()> {
        let body = serde_json::to_string(&Payload::new(name, data))
            .map_err(|e| BusError::Publish(format!("Failed to serialize event: {}", e)))?;
        self.push(&body, routing_key).await
    }
}

async fn publish(channel: &Channel, body: &str, routing_key: &str) -> Result<()> {
    topology::declare_exchange(channel).await?;

    debug!(routing_key, "Pushing event to exchange");

    // Confirms are not enabled on the channel; the returned confirmation
    // is not awaited.
    let _confirm = channel
        .basic_publish(
            LOGS_EXCHANGE,
            routing_key,
            BasicPublishOptions::default(),
            body.as_bytes(),
            BasicProperties::default().with_content_type("text/plain".into()),
        )
        .await
        .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?;

    Ok(())
}

async fn create_channel(connection: &Connection) -> Result<Channel> {
    connection
        .create_channel()
        .await
        .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))
}

/// Close a per-publish channel; a close failure is not the caller's problem.
async fn release_channel(channel: Channel) {
    // 200 = reply-success
    if let Err(e) = channel.close(200, "done").await {
        debug!(error = %e, "Channel close failed");
    }
}
