//! Error types for the gateway.
//!
//! Every failure raised by the auth gate, the dispatcher or a provider adapter
//! is a [`GatewayError`]. The server turns these (and anything else that
//! implements [`Fault`]) into the outward error envelope.

use std::any::Any;
use thiserror::Error;

/// Result alias used throughout the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error kinds
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Missing or invalid gateway bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// No active provider claims the requested model
    #[error("Model {model} not supported")]
    ModelNotSupported {
        /// The requested model id
        model: String,
    },

    /// Failure reported by (or while talking to) an upstream provider
    #[error("{provider}: {message}")]
    Upstream {
        /// Provider name
        provider: String,
        /// Human-readable description
        message: String,
        /// HTTP status reported by the upstream, if any
        status: Option<u16>,
    },

    /// Request body could not be parsed
    #[error("Malformed request: {message}")]
    MalformedRequest {
        /// Parse failure description
        message: String,
    },

    /// Failure while producing a streamed response
    #[error("Stream error: {message}")]
    Streaming {
        /// Error message
        message: String,
    },

    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a model-not-supported error
    pub fn model_not_supported(model: impl Into<String>) -> Self {
        Self::ModelNotSupported {
            model: model.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(
        provider: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
            status,
        }
    }

    /// Create a malformed-request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Create a streaming error
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code carried by this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::ModelNotSupported { .. } => 400,
            Self::Upstream { status, .. } => status.unwrap_or(500),
            Self::MalformedRequest { .. }
            | Self::Streaming { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Whether this error is the caller's fault rather than a system fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Anything that can be turned into the outward error envelope.
///
/// `status` is optional: faults that carry no status are reported as 500.
pub trait Fault {
    /// Status code carried by the fault, if any
    fn status(&self) -> Option<u16>;

    /// Human-readable description of the fault
    fn description(&self) -> String;
}

impl Fault for GatewayError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => Some(self.status_code()),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl Fault for serde_json::Error {
    fn status(&self) -> Option<u16> {
        None
    }

    fn description(&self) -> String {
        self.to_string()
    }
}

impl Fault for std::io::Error {
    fn status(&self) -> Option<u16> {
        None
    }

    fn description(&self) -> String {
        self.to_string()
    }
}

/// Panic payloads: `&str` and `String` carry their text, anything else has no
/// description.
impl Fault for Box<dyn Any + Send> {
    fn status(&self) -> Option<u16> {
        None
    }

    fn description(&self) -> String {
        if let Some(s) = self.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = self.downcast_ref::<String>() {
            s.clone()
        } else {
            String::new()
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Unauthorized.status_code(), 401);
        assert_eq!(GatewayError::model_not_supported("x").status_code(), 400);
        assert_eq!(GatewayError::upstream("p", "m", Some(429)).status_code(), 429);
        assert_eq!(GatewayError::upstream("p", "m", None).status_code(), 500);
        assert_eq!(GatewayError::malformed("bad").status_code(), 500);
        assert_eq!(GatewayError::internal("oops").status_code(), 500);
    }

    #[test]
    fn test_model_not_supported_message() {
        let err = GatewayError::model_not_supported("b-1");
        assert_eq!(err.to_string(), "Model b-1 not supported");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_upstream_fault_without_status() {
        let err = GatewayError::upstream("openai", "connection reset", None);
        assert_eq!(Fault::status(&err), None);
        assert_eq!(err.description(), "connection reset");
    }

    #[test]
    fn test_panic_payload_description() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(payload.description(), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(payload.description(), "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert!(payload.description().is_empty());
        assert_eq!(payload.status(), None);
    }
}
