//! Google Gemini provider implementation.
//!
//! Talks to the Google AI Studio API:
//! `https://generativelanguage.googleapis.com/v1beta/models/{MODEL}:generateContent`
//! and `:streamGenerateContent?alt=sse` for streaming.

use crate::common::{
    completion_id, decode_error, error_from_body, error_from_response, model_list, secret,
    select_key, setting, transport_error, LineBuffer,
};
use crate::registry::ProviderContext;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    with_cancellation, CancellationSignal, ChatChunk, ChatCompletion, ChatCompletionRequest,
    ChatMessage, ChunkDelta, ChunkStream, ContentPart, FinishReason, GatewayError,
    GatewayResult, MessageContent, MessageRole, ProviderAdapter, Usage,
};
use reqwest::{Client, RequestBuilder};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Default API base URL
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Credential holding the Google AI Studio key
pub const GOOGLE_GENERATIVE_AI_API_KEY: &str = "GOOGLE_GENERATIVE_AI_API_KEY";

const REQUIRED: &[&str] = &[GOOGLE_GENERATIVE_AI_API_KEY];
const GEMINI_MODELS: &[&str] = &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-1.0-pro"];

/// Google provider configuration
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// API key
    pub api_key: Option<SecretString>,
    /// Base URL
    pub base_url: String,
    /// Supported models
    pub models: Vec<String>,
}

impl GoogleConfig {
    /// Create a new Google AI Studio configuration
    #[must_use]
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            api_key,
            base_url: GOOGLE_BASE_URL.to_string(),
            models: model_list(GEMINI_MODELS),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Google Gemini provider implementation
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: GoogleConfig,
    client: Client,
}

impl GoogleProvider {
    /// Create a new Google provider
    #[must_use]
    pub fn new(config: GoogleConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Build from the credential mapping
    #[must_use]
    pub fn from_context(ctx: &ProviderContext) -> Self {
        let mut config = GoogleConfig::new(secret(&ctx.credentials, GOOGLE_GENERATIVE_AI_API_KEY));
        if let Some(url) = setting(&ctx.credentials, "GOOGLE_GENERATIVE_AI_BASE_URL") {
            config = config.with_base_url(url);
        }
        Self::new(config, ctx.http.clone())
    }

    /// Build the endpoint URL for a model
    fn endpoint_url(&self, model: &str, streaming: bool) -> String {
        let action = if streaming {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            action
        )
    }

    fn request(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
        streaming: bool,
    ) -> GatewayResult<RequestBuilder> {
        let key = select_key(self.name(), upstream_key, self.config.api_key.as_ref())?;
        let body = transform_request(request)?;
        let url = self.endpoint_url(&request.model, streaming);

        debug!(
            provider = "google",
            model = %request.model,
            streaming,
            "Sending Gemini request"
        );

        let mut builder = self.client.post(url).query(&[("key", key.as_str())]);
        if streaming {
            builder = builder.query(&[("alt", "sse")]);
        }
        Ok(builder.json(&body))
    }
}

/// Transform an OpenAI-shaped request to Google's format
fn transform_request(request: &ChatCompletionRequest) -> GatewayResult<GoogleRequest> {
    let messages = request.messages()?;

    let system_text: Vec<String> = messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(ChatMessage::text)
        .collect();
    let system_instruction = (!system_text.is_empty()).then(|| GoogleContent {
        role: None,
        parts: vec![GooglePart::Text {
            text: system_text.join("\n"),
        }],
    });

    let contents = messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| GoogleContent {
            role: Some(
                if m.role == MessageRole::Assistant {
                    "model"
                } else {
                    "user"
                }
                .to_string(),
            ),
            parts: transform_content(m.content.as_ref()),
        })
        .collect();

    let json_mode = request
        .payload
        .get("response_format")
        .and_then(|f| f.get("type"))
        .and_then(serde_json::Value::as_str)
        == Some("json_object");

    Ok(GoogleRequest {
        contents,
        system_instruction,
        generation_config: GoogleGenerationConfig {
            temperature: request.temperature(),
            top_p: request.top_p(),
            max_output_tokens: request.max_tokens(),
            stop_sequences: request.stop(),
            response_mime_type: json_mode.then(|| "application/json".to_string()),
        },
    })
}

/// Transform message content to Google parts
fn transform_content(content: Option<&MessageContent>) -> Vec<GooglePart> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![GooglePart::Text { text: text.clone() }],
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(GooglePart::Text { text: text.clone() }),
                ContentPart::ImageUrl { image_url } => {
                    if let Some((mime_type, data)) = image_url.as_data_url() {
                        Some(GooglePart::InlineData {
                            inline_data: GoogleInlineData {
                                mime_type: mime_type.to_string(),
                                data: data.to_string(),
                            },
                        })
                    } else {
                        // External URL - Gemini requires inline data
                        warn!(
                            url = %image_url.url,
                            "External image URLs not supported by Gemini, skipping"
                        );
                        None
                    }
                }
            })
            .collect(),
    }
}

/// Map Google finish reason to the OpenAI vocabulary
fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl GoogleResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        GooglePart::Text { text } => Some(text.as_str()),
                        GooglePart::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        self.candidates
            .first()?
            .finish_reason
            .as_deref()
            .map(map_finish_reason)
    }

    fn usage(&self) -> Option<Usage> {
        self.usage_metadata
            .as_ref()
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn required_credentials(&self) -> &[&'static str] {
        REQUIRED
    }

    fn supported_models(&self) -> &[String] {
        &self.config.models
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion> {
        let response = self
            .request(request, upstream_key, false)?
            .send()
            .await
            .map_err(|e| transport_error("google", &e))?;

        if !response.status().is_success() {
            return Err(error_from_response("google", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error("google", &e))?;
        trace!(body = %body, "Received Google response");

        let parsed: GoogleResponse =
            serde_json::from_str(&body).map_err(|e| decode_error("google", e))?;

        Ok(ChatCompletion::assistant_text(
            completion_id("google"),
            &request.model,
            parsed.text(),
            parsed.finish_reason(),
            parsed.usage(),
        ))
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let response = self
            .request(request, upstream_key, true)?
            .send()
            .await
            .map_err(|e| transport_error("google", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body("google", status.as_u16(), &body));
        }

        let model = request.model.clone();

        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let id = completion_id("google");
            let mut first = true;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = chunk_result.map_err(|e| transport_error("google", &e))?;
                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };

                    let parsed = serde_json::from_str::<GoogleResponse>(data.trim()).map_err(|e| {
                        warn!(error = %e, data = %data, "Unparsable Gemini event");
                        GatewayError::streaming(format!("google: invalid stream event: {e}"))
                    })?;

                    let text = parsed.text();
                    let mut delta = if text.is_empty() {
                        ChunkDelta::default()
                    } else {
                        ChunkDelta::text(text)
                    };
                    if first {
                        delta.role = Some(MessageRole::Assistant);
                        first = false;
                    }

                    yield ChatChunk::new(&id, &model, delta)
                        .with_finish_reason(parsed.finish_reason())
                        .with_usage(parsed.usage());
                }
            }
        };

        Ok(with_cancellation(stream, cancellation))
    }
}

// Google API Types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GoogleContent>,
    generation_config: GoogleGenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GooglePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GoogleInlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    #[serde(default)]
    content: GoogleContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
