//! What a stage hands back to the orchestrator.

use crate::payload::ContentPayload;

/// Outcome of one stage.
///
/// `Continue` is only produced through [`Next::call`](super::Next::call);
/// a stage halts by returning `Halt` directly, typically with a rejected
/// payload.
#[derive(Debug, Clone)]
#[must_use]
pub enum StageFlow {
    /// Pass the payload to the next stage.
    Continue(ContentPayload),
    /// Stop the run with this payload.
    Halt(ContentPayload),
}

impl StageFlow {
    /// Stops the run.
    pub const fn halt(payload: ContentPayload) -> Self {
        Self::Halt(payload)
    }

    /// Returns the payload.
    #[must_use]
    pub const fn payload(&self) -> &ContentPayload {
        match self {
            Self::Continue(payload) | Self::Halt(payload) => payload,
        }
    }

    /// Consumes the flow, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> ContentPayload {
        match self {
            Self::Continue(payload) | Self::Halt(payload) => payload,
        }
    }

    /// Returns true if the stage stopped the run.
    #[must_use]
    pub const fn is_halt(&self) -> bool {
        matches!(self, Self::Halt(_))
    }

    /// Returns true if the payload was rejected.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.payload().is_rejected()
    }
}
