//! # Gateway Providers
//!
//! LLM provider adapters for the Model Relay gateway.
//!
//! This crate provides implementations for various LLM providers:
//! - OpenAI (GPT-4o, GPT-4, o1, etc.)
//! - Anthropic (Claude), direct and on Vertex AI
//! - Google AI (Gemini)
//! - Azure OpenAI
//! - Cohere
//! - OpenAI-compatible vendors: DeepSeek, Moonshot, 01.AI, Groq, Bailian
//!
//! plus the ordered catalog that decides which of them are active.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod azure;
pub mod cohere;
mod common;
pub mod google;
pub mod openai;
pub mod registry;
pub mod vendors;

// Re-export main types
pub use anthropic::{AnthropicDeployment, AnthropicProvider};
pub use azure::{AzureOpenAIConfig, AzureOpenAIProvider};
pub use cohere::CohereProvider;
pub use google::{GoogleConfig, GoogleProvider};
pub use openai::{OpenAICompatibleConfig, OpenAICompatibleProvider};
pub use registry::{build_http_client, ProviderContext, ProviderEntry, ProviderRegistry};
