//! Response types (OpenAI compatible).

use crate::request::MessageRole;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields a vendor sends beyond the typed ones, relayed untouched.
pub type ExtraFields = Map<String, Value>;

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

/// Complete (buffered) chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Completion ID
    #[serde(default)]
    pub id: String,
    /// Object type, always `chat.completion`
    #[serde(default = "ChatCompletion::object_type")]
    pub object: String,
    /// Unix timestamp (seconds), defaulting to receipt time
    #[serde(default = "now")]
    pub created: i64,
    /// Model that produced the completion
    #[serde(default)]
    pub model: String,
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Upstream system fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Vendor extensions (`prompt_filter_results`, `x_groq`, ...)
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ChatCompletion {
    fn object_type() -> String {
        "chat.completion".to_string()
    }

    /// Single-choice assistant completion stamped with the current time
    #[must_use]
    pub fn assistant_text(
        id: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: id.into(),
            object: Self::object_type(),
            created: now(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(content),
                finish_reason,
                logprobs: None,
                extra: ExtraFields::new(),
            }],
            usage,
            system_fingerprint: None,
            extra: ExtraFields::new(),
        }
    }

    /// Text of the first choice
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

/// A choice in a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Generated message
    pub message: ResponseMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    /// Log probabilities, passed through when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Value>,
    /// Other per-choice fields (`content_filter_results`, ...)
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Assistant message in a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Role (assistant)
    pub role: MessageRole,
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// Anything else on the message (`refusal`, `reasoning_content`, ...)
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ResponseMessage {
    /// Assistant text message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            extra: ExtraFields::new(),
        }
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop or stop sequence
    Stop,
    /// Token limit reached
    Length,
    /// Model requested tool calls
    ToolCalls,
    /// Legacy function call
    FunctionCall,
    /// Content was filtered
    ContentFilter,
    /// Anything a provider reports that has no OpenAI equivalent
    #[serde(other)]
    Other,
}

/// Token usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
    /// Detail breakdowns (`prompt_tokens_details`, ...)
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Usage {
    /// Usage from prompt and completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            extra: ExtraFields::new(),
        }
    }
}

/// Model entry for `/v1/models`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model ID
    pub id: String,
    /// Object type, always `model`
    pub object: String,
    /// Unix timestamp (seconds)
    pub created: i64,
    /// Name of the owning provider
    pub owned_by: String,
}

impl ModelObject {
    /// Create a model entry
    #[must_use]
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created,
            owned_by: owned_by.into(),
        }
    }
}

/// `/v1/models` response page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type, always `list`
    pub object: String,
    /// Models
    pub data: Vec<ModelObject>,
}

impl ModelsResponse {
    /// Create a list page
    #[must_use]
    pub fn new(data: Vec<ModelObject>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
