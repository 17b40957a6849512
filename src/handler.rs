//! Event handlers and the downstream log sink.
//!
//! The consumer hands every received payload to an [`EventHandler`]. The
//! stock handler, [`SinkHandler`], routes events by name and forwards the
//! loggable ones to a [`LogSink`] — an opaque, fallible external
//! collaborator reached over a synchronous request.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{BusError, Result};
use crate::payload::Payload;

/// Handler for payloads received from the bus.
pub trait EventHandler: Send + Sync {
    /// Process one received payload.
    fn handle(&self, payload: Arc<Payload>) -> BoxFuture<'static, Result<()>>;
}

/// Destination for events that should be persisted as log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Record one entry. A non-success response from the collaborator is an
    /// error; the caller decides whether to surface or swallow it.
    async fn record(&self, entry: &Payload) -> Result<()>;
}

/// Log sink backed by an HTTP log-persistence service.
///
/// Posts the payload as JSON and expects `202 Accepted` back.
pub struct HttpLogSink {
    client: reqwest::Client,
    url: String,
}

impl HttpLogSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn record(&self, entry: &Payload) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(entry)
            .send()
            .await
            .map_err(|e| BusError::Sink(format!("Failed to reach log service: {}", e)))?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(BusError::Sink(format!(
                "Log service returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Routes events by logical name to a [`LogSink`].
///
/// `"log"` and `"event"` are forwarded; `"auth"` is intentionally dropped.
/// Any other name is forwarded like a log entry, matching the behavior the
/// rest of the system has come to rely on, but flagged with a warning since
/// unrecognized names usually mean a misconfigured producer.
pub struct SinkHandler {
    sink: Arc<dyn LogSink>,
}

impl SinkHandler {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl EventHandler for SinkHandler {
    fn handle(&self, payload: Arc<Payload>) -> BoxFuture<'static, Result<()>> {
        let sink = Arc::clone(&self.sink);
        Box::pin(async move {
            match payload.name.as_str() {
                "log" | "event" => sink.record(&payload).await,
                "auth" => {
                    debug!("Dropping auth event");
                    Ok(())
                }
                other => {
                    warn!(event = %other, "Unrecognized event name, forwarding to log sink");
                    sink.record(&payload).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// Sink that records entries, optionally failing every call.
    struct RecordingSink {
        entries: Mutex<Vec<Payload>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn record(&self, entry: &Payload) -> Result<()> {
            if self.fail {
                return Err(BusError::Sink("sink down".to_string()));
            }
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_log_event_forwarded_to_sink() {
        let sink = RecordingSink::new(false);
        let handler = SinkHandler::new(sink.clone());

        let payload = Arc::new(Payload::new("log", "user A logged in"));
        handler.handle(payload).await.unwrap();

        let entries = sink.entries.lock().await;
        assert_eq!(entries.as_slice(), &[Payload::new("log", "user A logged in")]);
    }

    #[tokio::test]
    async fn test_event_name_forwarded_to_sink() {
        let sink = RecordingSink::new(false);
        let handler = SinkHandler::new(sink.clone());

        handler
            .handle(Arc::new(Payload::new("event", "something")))
            .await
            .unwrap();

        assert_eq!(sink.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_event_dropped() {
        let sink = RecordingSink::new(false);
        let handler = SinkHandler::new(sink.clone());

        handler
            .handle(Arc::new(Payload::new("auth", "someone@example.com")))
            .await
            .unwrap();

        assert!(sink.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_name_forwarded_like_log() {
        let sink = RecordingSink::new(false);
        let handler = SinkHandler::new(sink.clone());

        handler
            .handle(Arc::new(Payload::new("metrics", "cpu=97")))
            .await
            .unwrap();

        assert_eq!(sink.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_surfaces_to_caller() {
        let sink = RecordingSink::new(true);
        let handler = SinkHandler::new(sink);

        let result = handler.handle(Arc::new(Payload::new("log", "x"))).await;
        assert!(matches!(result, Err(BusError::Sink(_))));
    }
}
