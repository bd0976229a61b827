//! Core domain types for contentflow.
//!
//! This module contains the status enums shared by runs, articles and
//! publish logs, plus the lifecycle event vocabulary.

mod event;
mod status;

pub use event::PipelineEvent;
pub use status::{ArticleStatus, PublishStatus, RunStatus};
