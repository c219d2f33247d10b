//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level so operators can
//! raise verbosity for a single module without touching the config file.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name recorded in the startup event
    pub service_name: String,
    /// Default filter directive
    pub level: String,
    /// JSON lines output
    pub json: bool,
    /// Include file and line in human readable output
    pub with_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "model-relay".to_string(),
            level: "info".to_string(),
            json: false,
            with_location: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default filter directive
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Toggle JSON output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Toggle file/line output
    #[must_use]
    pub fn with_location(mut self, enabled: bool) -> Self {
        self.with_location = enabled;
        self
    }

    /// Filter built from `RUST_LOG`, falling back to `level`
    ///
    /// # Errors
    /// Returns an error if `level` is not a valid directive
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| LoggingError::InvalidFilter(format!("{}: {e}", self.level))),
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns an error if the filter is invalid or a subscriber is already set
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.filter()?;

    let output = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(config.with_location)
            .with_line_number(config.with_location)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        json = config.json,
        "Logging initialized"
    );
    Ok(())
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to install the subscriber
    #[error("Failed to initialize logging: {0}")]
    Init(String),
    /// Invalid filter directive
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}
