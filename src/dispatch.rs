//! Bounded handler dispatch.
//!
//! The consume loop never waits for a handler to finish, but in-flight
//! handling is capped: a fixed set of worker tasks pulls payloads off one
//! bounded queue. When the queue fills up, submission awaits, which stops
//! the loop from pulling further deliveries off the broker until workers
//! catch up.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::error;

use crate::error::{BusError, Result};
use crate::handler::EventHandler;
use crate::payload::Payload;

/// Sizing for the dispatch pool.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// Payloads that may queue ahead of the workers before submission blocks.
    pub queue_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 64,
        }
    }
}

/// Fixed-size worker pool feeding payloads to a shared handler.
///
/// Handler failures are logged and discarded; a failing handler never
/// takes a worker down.
pub struct DispatchPool {
    tx: mpsc::Sender<Payload>,
}

impl DispatchPool {
    /// Start `config.workers` worker tasks over one bounded queue.
    pub fn spawn(config: DispatchConfig, handler: Arc<dyn EventHandler>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let payload = { rx.lock().await.recv().await };
                    let Some(payload) = payload else {
                        break;
                    };

                    let payload = Arc::new(payload);
                    if let Err(e) = handler.handle(Arc::clone(&payload)).await {
                        error!(worker, event = %payload.name, error = %e, "Handler failed");
                    }
                }
            });
        }

        Self { tx }
    }

    /// Queue a payload for handling, awaiting when the queue is full.
    pub async fn submit(&self, payload: Payload) -> Result<()> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| BusError::Subscribe("Dispatch workers stopped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{mpsc as tokio_mpsc, Semaphore};

    /// Handler that counts invocations and reports each handled payload.
    struct CountingHandler {
        count: Arc<AtomicUsize>,
        done: tokio_mpsc::Sender<Payload>,
    }

    impl EventHandler for CountingHandler {
        fn handle(&self, payload: Arc<Payload>) -> BoxFuture<'static, Result<()>> {
            let count = self.count.clone();
            let done = self.done.clone();
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
                let _ = done.send((*payload).clone()).await;
                Ok(())
            })
        }
    }

    /// Handler that fails on "bad" payloads.
    struct FlakyHandler {
        done: tokio_mpsc::Sender<Payload>,
    }

    impl EventHandler for FlakyHandler {
        fn handle(&self, payload: Arc<Payload>) -> BoxFuture<'static, Result<()>> {
            let done = self.done.clone();
            Box::pin(async move {
                let _ = done.send((*payload).clone()).await;
                if payload.name == "bad" {
                    return Err(BusError::Sink("refused".to_string()));
                }
                Ok(())
            })
        }
    }

    /// Handler that parks until a permit is released.
    struct GatedHandler {
        gate: Arc<Semaphore>,
        count: Arc<AtomicUsize>,
    }

    impl EventHandler for GatedHandler {
        fn handle(&self, _payload: Arc<Payload>) -> BoxFuture<'static, Result<()>> {
            let gate = self.gate.clone();
            let count = self.count.clone();
            Box::pin(async move {
                let _permit = gate.acquire().await.unwrap();
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_all_submitted_payloads_are_handled() {
        let count = Arc::new(AtomicUsize::new(0));
        let (done, mut rx) = tokio_mpsc::channel(16);
        let pool = DispatchPool::spawn(
            DispatchConfig::default(),
            Arc::new(CountingHandler {
                count: count.clone(),
                done,
            }),
        );

        for i in 0..10 {
            pool.submit(Payload::new("log", format!("entry {}", i)))
                .await
                .unwrap();
        }

        for _ in 0..10 {
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("Timed out waiting for handler")
                .expect("Channel closed");
        }
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_workers() {
        let (done, mut rx) = tokio_mpsc::channel(16);
        let pool = DispatchPool::spawn(
            DispatchConfig {
                workers: 1,
                queue_depth: 4,
            },
            Arc::new(FlakyHandler { done }),
        );

        pool.submit(Payload::new("bad", "boom")).await.unwrap();
        pool.submit(Payload::new("log", "still alive")).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.name, "bad");
        assert_eq!(second.data, "still alive");
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let gate = Arc::new(Semaphore::new(0));
        let count = Arc::new(AtomicUsize::new(0));
        let pool = DispatchPool::spawn(
            DispatchConfig {
                workers: 1,
                queue_depth: 1,
            },
            Arc::new(GatedHandler {
                gate: gate.clone(),
                count: count.clone(),
            }),
        );

        // One payload for the (blocked) worker, one filling the queue.
        pool.submit(Payload::new("log", "first")).await.unwrap();
        pool.submit(Payload::new("log", "second")).await.unwrap();

        // With worker and queue saturated, submission must pend.
        let blocked =
            tokio::time::timeout(Duration::from_millis(100), pool.submit(Payload::new("log", "third")))
                .await;
        assert!(blocked.is_err());

        // Release the gate; everything that was accepted gets handled.
        gate.add_permits(16);
        tokio::time::timeout(Duration::from_secs(1), async {
            while count.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Accepted payloads were not handled");
    }
}
