//! Run, article and publish status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a pipeline run.
///
/// `Pending -> Running -> {Completed | Rejected | Failed}` and
/// `Failed -> Running` on resume. `Completed` and `Rejected` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no stage started yet.
    #[default]
    Pending,
    /// A stage is executing.
    Running,
    /// All stages ran; an article may have been produced.
    Completed,
    /// A stage threw; resumable.
    Failed,
    /// Content was refused by a stage.
    Rejected,
}

impl RunStatus {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Returns true if the run may be resumed.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    ///
    /// `Running -> Running` advances between stages. `Pending` may end
    /// directly when a run has no stages to execute.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Completed | Self::Rejected),
            Self::Running => matches!(
                next,
                Self::Running | Self::Completed | Self::Rejected | Self::Failed
            ),
            Self::Failed => matches!(
                next,
                Self::Running | Self::Failed | Self::Completed | Self::Rejected
            ),
            Self::Completed | Self::Rejected => false,
        }
    }

    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Not visible yet.
    #[default]
    Draft,
    /// Live.
    Published,
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// Outcome recorded in a publish log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// The channel accepted the article.
    Success,
    /// The channel call failed.
    Failed,
}

impl PublishStatus {
    /// Returns true for a success row.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_resumable() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Rejected.is_terminal());
        assert!(!RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());

        assert!(RunStatus::Failed.is_resumable());
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Rejected,
        ] {
            assert!(!status.is_resumable(), "{status} must not be resumable");
        }
    }

    #[test]
    fn test_absorbing_states() {
        for next in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Rejected,
        ] {
            assert!(!RunStatus::Completed.can_transition_to(next));
            assert!(!RunStatus::Rejected.can_transition_to(next));
        }
    }

    #[test]
    fn test_resume_transition() {
        assert!(RunStatus::Failed.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&RunStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
        let parsed: RunStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, RunStatus::Failed);
    }

    #[test]
    fn test_publish_status() {
        assert!(PublishStatus::Success.is_success());
        assert!(!PublishStatus::Failed.is_success());
        assert_eq!(ArticleStatus::Published.to_string(), "published");
    }
}
