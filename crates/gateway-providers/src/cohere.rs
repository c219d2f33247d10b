//! Cohere v1 chat provider.
//!
//! Cohere takes the newest user turn as `message`, earlier turns as
//! `chat_history` and system text as `preamble`. Streaming responses are
//! newline-delimited JSON events rather than SSE.

use crate::common::{
    completion_id, decode_error, error_from_response, model_list, secret, select_key, setting,
    transport_error, LineBuffer,
};
use crate::registry::ProviderContext;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    with_cancellation, CancellationSignal, ChatChunk, ChatCompletion, ChatCompletionRequest,
    ChatMessage, ChunkDelta, ChunkStream, FinishReason, GatewayError, GatewayResult, MessageRole,
    ProviderAdapter, Usage,
};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default API base URL
pub const COHERE_BASE_URL: &str = "https://api.cohere.ai/v1";
/// Credential holding the Cohere API key
pub const COHERE_API_KEY: &str = "COHERE_API_KEY";

const REQUIRED: &[&str] = &[COHERE_API_KEY];
const COHERE_MODELS: &[&str] = &["command-r-plus", "command-r", "command", "command-light"];

/// Cohere provider
#[derive(Debug, Clone)]
pub struct CohereProvider {
    api_key: Option<SecretString>,
    base_url: String,
    models: Vec<String>,
    client: Client,
}

impl CohereProvider {
    /// Create a provider
    #[must_use]
    pub fn new(api_key: Option<SecretString>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
            models: model_list(COHERE_MODELS),
            client,
        }
    }

    /// Build from the credential mapping
    #[must_use]
    pub fn from_context(ctx: &ProviderContext) -> Self {
        Self::new(
            secret(&ctx.credentials, COHERE_API_KEY),
            setting(&ctx.credentials, "COHERE_BASE_URL")
                .unwrap_or_else(|| COHERE_BASE_URL.to_string()),
            ctx.http.clone(),
        )
    }

    fn request(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
        stream: bool,
    ) -> GatewayResult<RequestBuilder> {
        let key = select_key(self.name(), upstream_key, self.api_key.as_ref())?;
        let body = transform_request(request, stream)?;

        debug!(provider = "cohere", model = %request.model, stream, "Sending chat request");

        Ok(self
            .client
            .post(format!("{}/chat", self.base_url.trim_end_matches('/')))
            .bearer_auth(key)
            .json(&body))
    }

    async fn send(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
        stream: bool,
    ) -> GatewayResult<Response> {
        let response = self
            .request(request, upstream_key, stream)?
            .send()
            .await
            .map_err(|e| transport_error("cohere", &e))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response("cohere", response).await)
        }
    }
}

fn transform_request(request: &ChatCompletionRequest, stream: bool) -> GatewayResult<CohereRequest> {
    let mut messages = request.messages()?;

    let last_user = messages
        .iter()
        .rposition(|m| m.role == MessageRole::User)
        .ok_or_else(|| GatewayError::malformed("at least one user message is required"))?;
    let message = messages.remove(last_user).text();

    let preamble: Vec<String> = messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(ChatMessage::text)
        .collect();

    let chat_history = messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| HistoryEntry {
            role: if m.role == MessageRole::Assistant {
                "CHATBOT"
            } else {
                "USER"
            },
            message: m.text(),
        })
        .collect();

    Ok(CohereRequest {
        model: request.model.clone(),
        message,
        chat_history,
        preamble: (!preamble.is_empty()).then(|| preamble.join("\n")),
        temperature: request.temperature(),
        p: request.top_p(),
        max_tokens: request.max_tokens(),
        stop_sequences: request.stop(),
        stream,
    })
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "COMPLETE" | "STOP_SEQUENCE" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "ERROR_TOXIC" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl ProviderAdapter for CohereProvider {
    fn name(&self) -> &str {
        "cohere"
    }

    fn required_credentials(&self) -> &[&'static str] {
        REQUIRED
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion> {
        let body = self
            .send(request, upstream_key, false)
            .await?
            .text()
            .await
            .map_err(|e| transport_error("cohere", &e))?;

        let parsed: CohereResponse =
            serde_json::from_str(&body).map_err(|e| decode_error("cohere", e))?;

        Ok(ChatCompletion::assistant_text(
            parsed
                .generation_id
                .clone()
                .unwrap_or_else(|| completion_id("cohere")),
            &request.model,
            parsed.text,
            parsed.finish_reason.as_deref().map(map_finish_reason),
            parsed.meta.and_then(Meta::usage),
        ))
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let response = self.send(request, upstream_key, true).await?;
        let model = request.model.clone();

        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut id = completion_id("cohere");

            loop {
                let line = match lines.next_line() {
                    Some(line) => line,
                    None => match byte_stream.next().await {
                        Some(bytes) => {
                            lines.push(&bytes.map_err(|e| transport_error("cohere", &e))?);
                            continue;
                        }
                        None => match lines.finish() {
                            Some(rest) => rest,
                            None => break,
                        },
                    },
                };

                let event = serde_json::from_str::<StreamEvent>(&line).map_err(|e| {
                    warn!(error = %e, line = %line, "Unparsable Cohere event");
                    GatewayError::streaming(format!("cohere: invalid stream event: {e}"))
                })?;

                match event {
                    StreamEvent::StreamStart { generation_id } => {
                        if let Some(generation_id) = generation_id {
                            id = generation_id;
                        }
                        yield ChatChunk::new(&id, &model, ChunkDelta::assistant_start());
                    }
                    StreamEvent::TextGeneration { text } => {
                        yield ChatChunk::new(&id, &model, ChunkDelta::text(text));
                    }
                    StreamEvent::StreamEnd { finish_reason, response } => {
                        if finish_reason.as_deref() == Some("ERROR") {
                            Err(GatewayError::upstream("cohere", "Generation failed", None))?;
                        }
                        yield ChatChunk::new(&id, &model, ChunkDelta::default())
                            .with_finish_reason(finish_reason.as_deref().map(map_finish_reason))
                            .with_usage(response.and_then(|r| r.meta).and_then(Meta::usage));
                        break;
                    }
                    StreamEvent::Other => {}
                }
            }
        };

        Ok(with_cancellation(stream, cancellation))
    }
}

// Cohere API types

#[derive(Debug, Serialize)]
struct CohereRequest {
    model: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat_history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: &'static str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    text: String,
    #[serde(default)]
    generation_id: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    billed_units: Option<BilledUnits>,
}

impl Meta {
    fn usage(self) -> Option<Usage> {
        self.billed_units
            .map(|b| Usage::new(b.input_tokens, b.output_tokens))
    }
}

#[derive(Debug, Deserialize)]
struct BilledUnits {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
enum StreamEvent {
    StreamStart {
        #[serde(default)]
        generation_id: Option<String>,
    },
    TextGeneration {
        text: String,
    },
    StreamEnd {
        #[serde(default)]
        finish_reason: Option<String>,
        #[serde(default)]
        response: Option<StreamEndResponse>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamEndResponse {
    #[serde(default)]
    meta: Option<Meta>,
}
