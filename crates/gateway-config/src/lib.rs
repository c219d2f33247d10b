//! # Gateway Config
//!
//! Configuration management for the Model Relay gateway.
//!
//! This crate provides:
//! - The configuration model (listener, logging, access key, CORS, credentials)
//! - Loading from defaults, TOML/YAML files and the environment
//! - A lock-free, reloadable configuration handle

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod loader;

// Re-export main types
pub use config::{GatewayConfig, LoggingSettings, ServerSettings};
pub use loader::{ConfigError, ConfigHandle, ConfigLoader};
