//! Queued delivery to a slow downstream sink.

use super::EventSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Delivery counters for a [`ChannelEventSink`].
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    queued: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelMetrics {
    fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Events accepted into the queue.
    #[must_use]
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Events dropped because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Dropped events as a percentage of all events.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn drop_rate(&self) -> f64 {
        let queued = self.queued();
        let dropped = self.dropped();
        let total = queued + dropped;
        if total == 0 {
            0.0
        } else {
            (dropped as f64 / total as f64) * 100.0
        }
    }
}

struct EventMessage {
    event_type: String,
    data: Option<serde_json::Value>,
}

/// Buffers events in a bounded queue drained by a background task.
///
/// `emit` waits for queue space; `try_emit` drops the event and counts it
/// when the queue is full, so the pipeline is never stalled by a slow
/// webhook or notification listener.
pub struct ChannelEventSink {
    tx: Mutex<Option<mpsc::Sender<EventMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
    metrics: Arc<ChannelMetrics>,
}

impl fmt::Debug for ChannelEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEventSink")
            .field("capacity", &self.capacity)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ChannelEventSink {
    /// Creates the sink and spawns its worker on the current runtime.
    #[must_use]
    pub fn spawn(downstream: Arc<dyn EventSink>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<EventMessage>(capacity);

        let worker = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                downstream.emit(&msg.event_type, msg.data).await;
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            capacity,
            metrics: Arc::new(ChannelMetrics::default()),
        }
    }

    /// Returns the number of queued, undelivered events.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map_or(0, |tx| self.capacity - tx.capacity())
    }

    /// Returns the delivery counters.
    #[must_use]
    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    /// Closes the queue and waits until every queued event is delivered.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Event worker ended abnormally");
            }
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<EventMessage>> {
        self.tx.lock().clone()
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let Some(tx) = self.sender() else {
            self.metrics.record_drop();
            return;
        };
        let msg = EventMessage {
            event_type: event_type.to_string(),
            data,
        };
        if tx.send(msg).await.is_ok() {
            self.metrics.record_queued();
        } else {
            self.metrics.record_drop();
        }
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let Some(tx) = self.sender() else {
            self.metrics.record_drop();
            return;
        };
        let msg = EventMessage {
            event_type: event_type.to_string(),
            data,
        };
        if tx.try_send(msg).is_ok() {
            self.metrics.record_queued();
        } else {
            self.metrics.record_drop();
            warn!(
                event_type = %event_type,
                dropped_total = self.metrics.dropped(),
                "Event dropped, queue is full"
            );
        }
    }
}
