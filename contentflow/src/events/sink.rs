//! Event sink trait and implementations.

use crate::core::PipelineEvent;
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Receives pipeline events.
///
/// Sinks must never fail the caller: delivery problems are logged and
/// swallowed.
#[async_trait]
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - Dotted event type (e.g. "pipeline.started")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits an event without awaiting delivery.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits a typed pipeline event.
    async fn emit_event(&self, event: &PipelineEvent) {
        self.emit(event.event_type(), Some(event.to_data())).await;
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        let run_id = data
            .and_then(|d| d.get("run_id"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("-");

        match self.level {
            Level::DEBUG | Level::TRACE => {
                debug!(event_type = %event_type, run_id = %run_id, event_data = ?data, "Pipeline event");
            }
            _ if event_type == "pipeline.failed" => {
                let reason = data
                    .and_then(|d| d.get("reason"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default();
                warn!(event_type = %event_type, run_id = %run_id, reason = %reason, "Pipeline event");
            }
            _ => {
                info!(event_type = %event_type, run_id = %run_id, "Pipeline event");
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Records every event; used by tests and the harness.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the collected event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

/// Forwards every event to each listener.
#[derive(Debug, Default, Clone)]
pub struct FanOutEventSink {
    listeners: Vec<Arc<dyn EventSink>>,
}

impl FanOutEventSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EventSink>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Returns the number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if there are no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[async_trait]
impl EventSink for FanOutEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        join_all(
            self.listeners
                .iter()
                .map(|listener| listener.emit(event_type, data.clone())),
        )
        .await;
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        for listener in &self.listeners {
            listener.try_emit(event_type, data.clone());
        }
    }
}
