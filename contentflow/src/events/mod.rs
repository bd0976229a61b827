//! Event sinks for pipeline lifecycle and business events.
//!
//! The orchestrator and stages emit [`PipelineEvent`](crate::core::PipelineEvent)s
//! through an injected [`EventSink`]. Webhooks and notification listeners
//! plug in as sinks; there is no process-wide bus.

mod channel;
mod sink;

pub use channel::{ChannelEventSink, ChannelMetrics};
pub use sink::{CollectingEventSink, EventSink, FanOutEventSink, LoggingEventSink, NoOpEventSink};
