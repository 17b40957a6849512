//! Event consumer: ephemeral queue, topic bindings, and the consume loop.

use std::sync::Arc;

use futures::StreamExt;
use lapin::{
    options::{BasicConsumeOptions, QueueBindOptions},
    types::FieldTable,
    Connection,
};
use tracing::info;

use crate::dispatch::{DispatchConfig, DispatchPool};
use crate::error::{BusError, Result};
use crate::handler::EventHandler;
use crate::payload::Payload;
use crate::topology::{self, LOGS_EXCHANGE};

/// Consumes log events from the `logs_topic` exchange.
///
/// Each consumer instance provisions its own broker-named exclusive queue,
/// so every instance bound to a pattern receives an independent copy of
/// each matching message (broadcast, not competing consumers). Delivery is
/// auto-acknowledged: a message is considered consumed the instant the
/// broker hands it over, trading durability for loop liveness.
pub struct Consumer {
    connection: Arc<Connection>,
    handler: Arc<dyn EventHandler>,
    dispatch: DispatchConfig,
}

impl Consumer {
    /// Create a consumer over a shared connection, declaring the exchange
    /// up front.
    pub async fn new(
        connection: Arc<Connection>,
        handler: Arc<dyn EventHandler>,
        dispatch: DispatchConfig,
    ) -> Result<Self> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;
        topology::declare_exchange(&channel).await?;

        Ok(Self {
            connection,
            handler,
            dispatch,
        })
    }

    /// Bind to the given routing-key patterns and consume until the
    /// connection dies.
    ///
    /// Blocks for the life of the delivery stream. Setup failures (channel,
    /// exchange, queue, bind, consume) return immediately; a bind failure
    /// does not roll back earlier bindings since the exclusive queue
    /// disappears with the connection anyway. Once consuming, the only way
    /// out is the stream ending, which is reported as a connection error.
    pub async fn listen(&self, topics: &[String]) -> Result<()> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;

        topology::declare_exchange(&channel).await?;
        let queue = topology::declare_ephemeral_queue(&channel).await?;

        for topic in topics {
            channel
                .queue_bind(
                    queue.name().as_str(),
                    LOGS_EXCHANGE,
                    topic,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    BusError::Subscribe(format!("Failed to bind queue to '{}': {}", topic, e))
                })?;
        }

        let mut deliveries = channel
            .basic_consume(
                queue.name().as_str(),
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))?;

        let pool = DispatchPool::spawn(self.dispatch.clone(), Arc::clone(&self.handler));

        info!(
            exchange = LOGS_EXCHANGE,
            queue = %queue.name(),
            ?topics,
            "Waiting for messages"
        );

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery
                .map_err(|e| BusError::Connection(format!("Delivery stream failed: {}", e)))?;

            // Auto-ack means this message is already ours; handling happens
            // on the pool so the loop only ever waits on queue capacity.
            pool.submit(Payload::from_bytes(&delivery.data)).await?;
        }

        Err(BusError::Connection("Delivery stream ended".to_string()))
    }
}
