//! Streaming chunk types and cooperative cancellation.

use crate::error::GatewayResult;
use crate::request::MessageRole;
use crate::response::{now, ExtraFields, FinishReason, Usage};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Lazy, finite, non-restartable sequence of chunks produced by an adapter
pub type ChunkStream = BoxStream<'static, GatewayResult<ChatChunk>>;

/// One incremental unit of a streamed completion (`chat.completion.chunk`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Completion ID (shared by all chunks of one completion)
    #[serde(default)]
    pub id: String,
    /// Object type, always `chat.completion.chunk`
    #[serde(default = "ChatChunk::object_type")]
    pub object: String,
    /// Unix timestamp (seconds), defaulting to receipt time
    #[serde(default = "now")]
    pub created: i64,
    /// Model producing the chunk
    #[serde(default)]
    pub model: String,
    /// Choice deltas
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, usually only on the final chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Upstream system fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Vendor extensions, relayed untouched
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ChatChunk {
    fn object_type() -> String {
        "chat.completion.chunk".to_string()
    }

    /// Single-choice chunk stamped with the current time
    #[must_use]
    pub fn new(id: impl Into<String>, model: impl Into<String>, delta: ChunkDelta) -> Self {
        Self {
            id: id.into(),
            object: Self::object_type(),
            created: now(),
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
                logprobs: None,
                extra: ExtraFields::new(),
            }],
            usage: None,
            system_fingerprint: None,
            extra: ExtraFields::new(),
        }
    }

    /// Set the finish reason of the first choice
    #[must_use]
    pub fn with_finish_reason(mut self, reason: Option<FinishReason>) -> Self {
        if let Some(choice) = self.choices.first_mut() {
            choice.finish_reason = reason;
        }
        self
    }

    /// Attach usage
    #[must_use]
    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    /// Text delta of the first choice
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }
}

/// Choice in a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental content
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the last chunk of a choice
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    /// Log probabilities, passed through when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Value>,
    /// Other per-choice fields (`content_filter_results`, ...)
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Incremental message content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, usually only on the first chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    /// Text delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool call deltas, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// `reasoning_content`, `refusal` and other vendor delta fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ChunkDelta {
    /// Role-only delta opening an assistant message
    #[must_use]
    pub fn assistant_start() -> Self {
        Self {
            role: Some(MessageRole::Assistant),
            ..Self::default()
        }
    }

    /// Text delta
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Single-shot cancellation shared between the transport and an adapter.
///
/// Clones observe the same state. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    /// Create an untriggered signal
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger cancellation. Returns `true` only for the call that actually
    /// flipped the signal.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    /// Whether cancellation has been triggered
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation is triggered
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// End `inner` as soon as `signal` fires, dropping it (and with it any
/// upstream connection it holds).
pub fn with_cancellation<S>(inner: S, signal: CancellationSignal) -> ChunkStream
where
    S: Stream<Item = GatewayResult<ChatChunk>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut inner = Box::pin(inner);
        loop {
            if signal.is_cancelled() {
                break;
            }
            let next = tokio::select! {
                biased;
                () = signal.cancelled() => None,
                item = inner.next() => item,
            };
            match next {
                Some(item) => yield item,
                None => break,
            }
        }
    };
    stream.boxed()
}
