//! Tracing subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::errors::{ContentFlowError, Result};

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info" or
    /// "contentflow=debug,warn").
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// JSON output at `level`.
    #[must_use]
    pub fn json(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            json: true,
        }
    }

    fn filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| ContentFlowError::Config(format!("invalid log filter '{}': {e}", self.level))),
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured level.
///
/// # Errors
///
/// `Config` for an unparsable level or when a global subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false).with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| ContentFlowError::Config(format!("tracing already initialised: {e}")))
}

/// Installs a warn-level test writer subscriber; later calls are no-ops.
pub fn try_init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
