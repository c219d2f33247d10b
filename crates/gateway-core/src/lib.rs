//! # Gateway Core
//!
//! Core types, traits, and error handling for the Model Relay gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Request, response and streaming chunk types (OpenAI shaped)
//! - The `ProviderAdapter` contract every vendor implements
//! - Cooperative stream cancellation
//! - Error types and the `Fault` capability used for error normalization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;

// Re-export commonly used types
pub use error::{Fault, GatewayError, GatewayResult};
pub use provider::ProviderAdapter;
pub use request::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, MessageRole,
};
pub use response::{
    ChatCompletion, Choice, ExtraFields, FinishReason, ModelObject, ModelsResponse,
    ResponseMessage, Usage,
};
pub use streaming::{
    with_cancellation, CancellationSignal, ChatChunk, ChunkChoice, ChunkDelta, ChunkStream,
};
pub use types::CredentialMapping;
