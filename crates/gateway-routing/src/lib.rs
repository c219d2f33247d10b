//! # Gateway Routing
//!
//! Model-based dispatch for the Model Relay gateway.
//!
//! This crate provides:
//! - Resolution of a model id to exactly one active provider
//! - Detection of model ids claimed by more than one provider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;

// Re-export main types
pub use dispatcher::{find_overlaps, resolve, warn_overlaps, ModelOverlap};
