//! # Gateway Telemetry
//!
//! Observability for the Model Relay gateway.
//!
//! This crate provides:
//! - Structured logging (human readable or JSON lines)
//! - Request and provider spans

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod spans;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use spans::{record_provider, request_span};

#[doc(hidden)]
pub use tracing as __tracing;
