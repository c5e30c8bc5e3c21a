//! Batched click writer
//!
//! Uses an actor fed by an mpsc channel so the request path only pays for a
//! `try_send`. The actor flushes its batch to storage on a timer, when the
//! batch is full, and on shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::ClickLogger;
use crate::models::{ClickProperties, ClickRecord};
use crate::storage::ShortUrlStore;

/// Flush early once this many clicks are pending.
const MAX_BATCH: usize = 500;

enum ActorMessage {
    Record(ClickRecord),
    /// Flush everything and acknowledge
    Shutdown(oneshot::Sender<()>),
}

struct ClickActor {
    receiver: mpsc::Receiver<ActorMessage>,
    batch: Vec<ClickRecord>,
    storage: Arc<dyn ShortUrlStore>,
    flush_interval: Duration,
}

impl ClickActor {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);

        // Skip the first tick which fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                Some(msg) = self.receiver.recv() => {
                    match msg {
                        ActorMessage::Record(record) => {
                            self.batch.push(record);
                            if self.batch.len() >= MAX_BATCH {
                                self.flush().await;
                            }
                        }
                        ActorMessage::Shutdown(ack) => {
                            info!("Click writer received shutdown signal, flushing...");
                            self.drain_pending();
                            self.flush().await;
                            let _ = ack.send(());
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
                else => {
                    warn!("Click channel closed unexpectedly, flushing...");
                    self.flush().await;
                    break;
                }
            }
        }
    }

    /// Pull whatever is already queued behind the shutdown message.
    fn drain_pending(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            if let ActorMessage::Record(record) = msg {
                self.batch.push(record);
            }
        }
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        match self.storage.log_clicks(&batch).await {
            Ok(()) => debug!(count = batch.len(), "flushed clicks"),
            Err(e) => error!(count = batch.len(), error = %e, "Failed to flush clicks"),
        }
    }
}

pub struct BufferedClickLogger {
    actor_tx: mpsc::Sender<ActorMessage>,
}

impl BufferedClickLogger {
    /// Spawn the writer. Must be called inside a tokio runtime.
    pub fn new(storage: Arc<dyn ShortUrlStore>, buffer_size: usize, flush_interval_ms: u64) -> Self {
        let (actor_tx, receiver) = mpsc::channel(buffer_size.max(1));

        let actor = ClickActor {
            receiver,
            batch: Vec::new(),
            storage,
            flush_interval: Duration::from_millis(flush_interval_ms.max(1)),
        };

        tokio::spawn(async move {
            actor.run().await;
        });

        Self { actor_tx }
    }

    /// Flush buffered clicks and stop the writer.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.actor_tx.send(ActorMessage::Shutdown(ack_tx)).await.is_err() {
            return;
        }
        if ack_rx.await.is_ok() {
            info!("Click buffer flushed successfully on shutdown");
        }
    }
}

impl ClickLogger for BufferedClickLogger {
    fn log(&self, key: &str, properties: ClickProperties) {
        let record = ClickRecord::new(key, properties);
        if self.actor_tx.try_send(ActorMessage::Record(record)).is_err() {
            warn!(short_code = %key, "Click buffer full, dropping click");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn properties() -> ClickProperties {
        ClickProperties {
            ip: Some("127.0.0.1".into()),
            browser: "Chrome-58.0".into(),
            platform: "Windows".into(),
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_clicks() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = BufferedClickLogger::new(storage.clone(), 100, 60_000);

        for _ in 0..5 {
            logger.log("abc", properties());
        }
        logger.shutdown().await;

        assert_eq!(storage.clicks_for("abc").len(), 5);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = BufferedClickLogger::new(storage.clone(), 100, 10);

        logger.log("abc", properties());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(storage.clicks_for("abc").len(), 1);
        logger.shutdown().await;
    }
}
