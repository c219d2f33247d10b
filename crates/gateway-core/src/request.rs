//! Request types for the gateway.
//!
//! Only `model` and `stream` are authoritative for routing; the rest of the
//! OpenAI-shaped body is kept verbatim in `payload` and handed to the selected
//! adapter. Adapters that speak a different wire format read it back through
//! the typed accessors.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Target model (e.g., "gpt-4o", "claude-3-opus-20240229")
    pub model: String,

    /// Whether the caller wants a streamed response
    #[serde(default)]
    pub stream: bool,

    /// Everything else in the body, untouched
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ChatCompletionRequest {
    /// Create a request with an empty payload
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            payload: Map::new(),
        }
    }

    /// Set the stream flag
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set a payload field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Set the messages
    #[must_use]
    pub fn with_messages(self, messages: &[ChatMessage]) -> Self {
        let value = serde_json::to_value(messages).unwrap_or(Value::Array(Vec::new()));
        self.with_field("messages", value)
    }

    /// Parse a request body
    ///
    /// # Errors
    /// Returns `MalformedRequest` if the body is not a valid request object
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        serde_json::from_slice(body).map_err(|e| GatewayError::malformed(e.to_string()))
    }

    /// Full JSON body as an OpenAI-compatible upstream expects it, with the
    /// `stream` flag forced to `stream`
    #[must_use]
    pub fn to_upstream_body(&self, stream: bool) -> Value {
        let mut body = self.payload.clone();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("stream".to_string(), Value::Bool(stream));
        Value::Object(body)
    }

    /// Typed view of `messages`
    ///
    /// # Errors
    /// Returns `MalformedRequest` if `messages` is missing or has the wrong shape
    pub fn messages(&self) -> GatewayResult<Vec<ChatMessage>> {
        let raw = self
            .payload
            .get("messages")
            .ok_or_else(|| GatewayError::malformed("messages is required"))?;
        serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::malformed(format!("invalid messages: {e}")))
    }

    /// Sampling temperature
    #[must_use]
    pub fn temperature(&self) -> Option<f32> {
        self.f32_field("temperature")
    }

    /// Nucleus sampling parameter
    #[must_use]
    pub fn top_p(&self) -> Option<f32> {
        self.f32_field("top_p")
    }

    /// Maximum tokens to generate (`max_tokens`, or the newer
    /// `max_completion_tokens`)
    #[must_use]
    pub fn max_tokens(&self) -> Option<u32> {
        self.payload
            .get("max_tokens")
            .or_else(|| self.payload.get("max_completion_tokens"))
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
    }

    /// Stop sequences; a single string is promoted to a one-element list
    #[must_use]
    pub fn stop(&self) -> Option<Vec<String>> {
        match self.payload.get("stop")? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Caller-supplied end-user identifier
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.payload.get("user").and_then(Value::as_str)
    }

    fn f32_field(&self, key: &str) -> Option<f32> {
        self.payload.get(key).and_then(Value::as_f64).map(|v| v as f32)
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,

    /// Content of the message
    #[serde(default)]
    pub content: Option<MessageContent>,

    /// Optional name of the author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool call ID for tool response messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a message with text content
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
            tool_call_id: None,
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// All text in the message, parts joined by newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::joined_text)
            .unwrap_or_default()
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// Developer message (newer OpenAI name for system)
    Developer,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool response message
    Tool,
}

impl MessageRole {
    /// Whether this role carries instructions rather than conversation
    #[must_use]
    pub fn is_instruction(self) -> bool {
        matches!(self, Self::System | Self::Developer)
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Developer => write!(f, "developer"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Message content (text or multimodal parts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multimodal content parts
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of all text parts joined by newlines
    #[must_use]
    pub fn joined_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Content part for multimodal messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text {
        /// The text content
        text: String,
    },
    /// Image content part
    ImageUrl {
        /// Image URL details
        image_url: ImageUrl,
    },
}

/// Image URL for vision models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    /// URL of the image (http(s) or `data:` URL)
    pub url: String,
    /// Detail level for processing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ImageUrl {
    /// Split a `data:<mime>;base64,<data>` URL into mime type and payload
    #[must_use]
    pub fn as_data_url(&self) -> Option<(&str, &str)> {
        let rest = self.url.strip_prefix("data:")?;
        let (meta, data) = rest.split_once(',')?;
        let mime = meta.strip_suffix(";base64").unwrap_or(meta);
        Some((mime, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_preserved() {
        let body = json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "logit_bias": {"50256": -100}
        });
        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.model, "gpt-4o");
        assert!(request.stream);
        assert!(request.payload.contains_key("logit_bias"));
        assert!(!request.payload.contains_key("model"));

        let upstream = request.to_upstream_body(false);
        assert_eq!(upstream["model"], "gpt-4o");
        assert_eq!(upstream["stream"], false);
        assert_eq!(upstream["logit_bias"]["50256"], -100);
    }

    #[test]
    fn test_stream_defaults_to_false() {
        let request = ChatCompletionRequest::from_slice(br#"{"model":"m"}"#).unwrap();
        assert!(!request.stream);
    }

    #[test]
    fn test_malformed_body() {
        let err = ChatCompletionRequest::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest { .. }));
        assert_eq!(err.status_code(), 500);

        let err = ChatCompletionRequest::from_slice(br#"{"stream":true}"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest { .. }));
    }

    #[test]
    fn test_typed_accessors() {
        let request = ChatCompletionRequest::new("m")
            .with_messages(&[ChatMessage::system("be brief"), ChatMessage::user("hi")])
            .with_field("max_tokens", json!(64))
            .with_field("top_p", json!(0.5))
            .with_field("stop", json!("END"));

        let messages = request.messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].text(), "hi");
        assert_eq!(request.max_tokens(), Some(64));
        assert_eq!(request.top_p(), Some(0.5));
        assert_eq!(request.stop(), Some(vec!["END".to_string()]));
        assert_eq!(request.temperature(), None);
    }

    #[test]
    fn test_multimodal_content() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]
        }))
        .unwrap();

        assert_eq!(message.text(), "what is this?");
        let Some(MessageContent::Parts(parts)) = &message.content else {
            panic!("expected parts");
        };
        let ContentPart::ImageUrl { image_url } = &parts[1] else {
            panic!("expected image");
        };
        assert_eq!(image_url.as_data_url(), Some(("image/png", "AAAA")));
    }
}
