//! logbus - asynchronous log-event delivery over a RabbitMQ topic exchange.
//!
//! Producers obtain an [`Emitter`] over a shared broker connection and push
//! `{name, data}` events under dot-segmented routing keys. Consumers bind a
//! private, broker-named queue to routing-key patterns on the durable
//! `logs_topic` exchange and dispatch each delivered event to a handler
//! through a bounded worker pool. Delivery is broadcast (every bound
//! consumer gets its own copy) and at-most-once (auto-acknowledged).

pub mod config;
pub mod connection;
pub mod consumer;
pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod payload;
pub mod topology;

pub use consumer::Consumer;
pub use dispatch::{DispatchConfig, DispatchPool};
pub use emitter::Emitter;
pub use error::{BusError, Result};
pub use handler::{EventHandler, HttpLogSink, LogSink, SinkHandler};
pub use payload::Payload;
pub use topology::LOGS_EXCHANGE;
