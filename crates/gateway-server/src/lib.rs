//! # Gateway Server
//!
//! HTTP server implementation for the Model Relay gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server with graceful shutdown
//! - OpenAI-compatible API endpoints
//! - Access key gate
//! - SSE delivery with client-disconnect cancellation
//! - Uniform error envelopes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod signals;
pub mod state;
pub mod streaming;

// Re-export main types
pub use auth::{auth_middleware, authorize};
pub use error::{handle_panic, ApiError};
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use signals::{shutdown_signal, spawn_reload_on_hangup};
pub use state::AppState;
pub use streaming::{sse_response, CancelOnDrop};
