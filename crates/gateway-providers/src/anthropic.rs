//! Anthropic Messages API provider.
//!
//! Two deployments share one translation layer:
//! - direct: `POST {base}/v1/messages` with `x-api-key` and `anthropic-version`
//! - Vertex AI: `POST .../publishers/anthropic/models/{model}:rawPredict`
//!   (`:streamRawPredict` when streaming) with a bearer token and
//!   `anthropic_version` in the body instead of `model`

use crate::common::{
    completion_id, decode_error, error_from_body, error_from_response, model_list, secret,
    select_key, setting, transport_error,
};
use crate::registry::ProviderContext;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    with_cancellation, CancellationSignal, ChatChunk, ChatCompletion, ChatCompletionRequest,
    ChatMessage, ChunkDelta, ChunkStream, ContentPart, FinishReason, GatewayError, GatewayResult,
    MessageContent, MessageRole, ProviderAdapter, Usage,
};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{retry::Never, Error as EventSourceError, Event, EventSource};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Messages API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// `anthropic_version` body field on Vertex AI
pub const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
/// Default `max_tokens`; the Messages API requires one
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Credential holding the Anthropic API key
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Vertex project id
pub const VERTEX_ANTHROPIC_PROJECT_ID: &str = "VERTEX_ANTHROPIC_PROJECT_ID";
/// Vertex region
pub const VERTEX_ANTHROPIC_REGION: &str = "VERTEX_ANTHROPIC_REGION";
/// Vertex OAuth access token
pub const VERTEX_ANTHROPIC_ACCESS_TOKEN: &str = "VERTEX_ANTHROPIC_ACCESS_TOKEN";

const DIRECT_REQUIRED: &[&str] = &[ANTHROPIC_API_KEY];
const VERTEX_REQUIRED: &[&str] = &[
    VERTEX_ANTHROPIC_PROJECT_ID,
    VERTEX_ANTHROPIC_REGION,
    VERTEX_ANTHROPIC_ACCESS_TOKEN,
];

const DIRECT_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];
const VERTEX_MODELS: &[&str] = &[
    "claude-3-5-sonnet@20240620",
    "claude-3-opus@20240229",
    "claude-3-sonnet@20240229",
    "claude-3-haiku@20240307",
];

/// Where the Messages API is hosted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnthropicDeployment {
    /// api.anthropic.com (or a compatible base URL)
    Direct {
        /// Base URL without `/v1/messages`
        base_url: String,
    },
    /// Google Cloud Vertex AI
    Vertex {
        /// Project id
        project_id: String,
        /// Region, e.g. `us-east5`
        region: String,
        /// Endpoint override (scheme and host), for private endpoints
        endpoint: Option<String>,
    },
}

/// Anthropic provider
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    name: &'static str,
    deployment: AnthropicDeployment,
    credential: Option<SecretString>,
    models: Vec<String>,
    client: Client,
}

impl AnthropicProvider {
    /// Create a provider for `deployment`
    #[must_use]
    pub fn new(
        deployment: AnthropicDeployment,
        credential: Option<SecretString>,
        client: Client,
    ) -> Self {
        let (name, models) = match deployment {
            AnthropicDeployment::Direct { .. } => ("anthropic", DIRECT_MODELS),
            AnthropicDeployment::Vertex { .. } => ("anthropic-vertex", VERTEX_MODELS),
        };
        Self {
            name,
            deployment,
            credential,
            models: model_list(models),
            client,
        }
    }

    /// Direct Messages API from the credential mapping
    #[must_use]
    pub fn direct(ctx: &ProviderContext) -> Self {
        let base_url = setting(&ctx.credentials, "ANTHROPIC_BASE_URL")
            .unwrap_or_else(|| "https://api.anthropic.com".to_string());
        Self::new(
            AnthropicDeployment::Direct { base_url },
            secret(&ctx.credentials, ANTHROPIC_API_KEY),
            ctx.http.clone(),
        )
    }

    /// Vertex AI hosted Claude from the credential mapping
    #[must_use]
    pub fn vertex(ctx: &ProviderContext) -> Self {
        let creds = &ctx.credentials;
        Self::new(
            AnthropicDeployment::Vertex {
                project_id: setting(creds, VERTEX_ANTHROPIC_PROJECT_ID).unwrap_or_default(),
                region: setting(creds, VERTEX_ANTHROPIC_REGION).unwrap_or_default(),
                endpoint: setting(creds, "VERTEX_ANTHROPIC_ENDPOINT"),
            },
            secret(creds, VERTEX_ANTHROPIC_ACCESS_TOKEN),
            ctx.http.clone(),
        )
    }

    fn endpoint_url(&self, model: &str, stream: bool) -> String {
        match &self.deployment {
            AnthropicDeployment::Direct { base_url } => {
                format!("{}/v1/messages", base_url.trim_end_matches('/'))
            }
            AnthropicDeployment::Vertex {
                project_id,
                region,
                endpoint,
            } => {
                let host = endpoint.as_ref().map_or_else(
                    || format!("https://{region}-aiplatform.googleapis.com"),
                    |e| e.trim_end_matches('/').to_string(),
                );
                let action = if stream {
                    "streamRawPredict"
                } else {
                    "rawPredict"
                };
                format!(
                    "{host}/v1/projects/{project_id}/locations/{region}/publishers/anthropic/models/{model}:{action}"
                )
            }
        }
    }

    /// Translate an OpenAI-shaped request into a Messages API body
    fn transform_request(
        &self,
        request: &ChatCompletionRequest,
        stream: bool,
    ) -> GatewayResult<AnthropicRequest> {
        let messages = request.messages()?;
        let (system, messages) = split_system(&messages);

        let (model, anthropic_version) = match self.deployment {
            AnthropicDeployment::Direct { .. } => (Some(request.model.clone()), None),
            AnthropicDeployment::Vertex { .. } => (None, Some(VERTEX_ANTHROPIC_VERSION)),
        };

        Ok(AnthropicRequest {
            model,
            anthropic_version,
            messages,
            system,
            max_tokens: request.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature(),
            top_p: request.top_p(),
            stop_sequences: request.stop(),
            stream,
        })
    }

    fn request(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
        stream: bool,
    ) -> GatewayResult<RequestBuilder> {
        let key = select_key(self.name, upstream_key, self.credential.as_ref())?;
        let body = self.transform_request(request, stream)?;
        let url = self.endpoint_url(&request.model, stream);

        debug!(
            provider = %self.name,
            model = %request.model,
            stream,
            "Sending Messages API request"
        );

        let builder = self.client.post(url).json(&body);
        Ok(match self.deployment {
            AnthropicDeployment::Direct { .. } => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            AnthropicDeployment::Vertex { .. } => builder.bearer_auth(key),
        })
    }
}

/// Pull system/developer messages into the top-level `system` field and
/// convert the rest. Tool results are sent back as user turns.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let system: Vec<String> = messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(ChatMessage::text)
        .collect();

    let converted = messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| AnthropicMessage {
            role: if m.role == MessageRole::Assistant {
                "assistant"
            } else {
                "user"
            },
            content: convert_content(m.content.as_ref()),
        })
        .collect();

    let system = (!system.is_empty()).then(|| system.join("\n"));
    (system, converted)
}

fn convert_content(content: Option<&MessageContent>) -> Vec<AnthropicBlock> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![AnthropicBlock::Text { text: text.clone() }],
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(AnthropicBlock::Text { text: text.clone() }),
                ContentPart::ImageUrl { image_url } => match image_url.as_data_url() {
                    Some((media_type, data)) => Some(AnthropicBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: media_type.to_string(),
                            data: data.to_string(),
                        },
                    }),
                    None => {
                        warn!(url = %image_url.url, "Only data URLs are forwarded as images; skipping");
                        None
                    }
                },
            })
            .collect(),
    }
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

fn transform_response(response: AnthropicResponse, model: &str) -> ChatCompletion {
    let text: String = response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.as_str()),
            ResponseBlock::Other => None,
        })
        .collect();

    ChatCompletion::assistant_text(
        response.id,
        model,
        text,
        response.stop_reason.as_deref().map(map_stop_reason),
        Some(Usage::new(
            response.usage.input_tokens,
            response.usage.output_tokens,
        )),
    )
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn required_credentials(&self) -> &[&'static str] {
        match self.deployment {
            AnthropicDeployment::Direct { .. } => DIRECT_REQUIRED,
            AnthropicDeployment::Vertex { .. } => VERTEX_REQUIRED,
        }
    }

    fn supported_models(&self) -> &[String] {
        &self.models
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
            .map_err(|e| transport_error(self.name, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.name, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.name, &e))?;
        trace!(provider = %self.name, body = %body, "Received Messages API response");

        let parsed: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| decode_error(self.name, e))?;
        Ok(transform_response(parsed, &request.model))
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let builder = self.request(request, upstream_key, true)?;
        let mut event_source = EventSource::new(builder).map_err(|e| {
            GatewayError::upstream(self.name, format!("Failed to create event source: {e}"), None)
        })?;
        event_source.set_retry_policy(Box::new(Never));

        let provider = self.name;
        let model = request.model.clone();

        let stream = try_stream! {
            let mut es = event_source;
            let mut id = completion_id("msg");
            let mut prompt_tokens = 0u32;

            while let Some(event) = es.next().await {
                let msg = match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(msg)) => msg,
                    Err(EventSourceError::StreamEnded) => break,
                    Err(EventSourceError::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();
                        Err(error_from_body(provider, status.as_u16(), &body))?
                    }
                    Err(e) => {
                        Err(GatewayError::upstream(provider, format!("Stream error: {e}"), None))?
                    }
                };

                if msg.data.trim().is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str::<StreamEvent>(&msg.data).map_err(|e| {
                    warn!(provider = %provider, event = %msg.event, error = %e, "Unparsable stream event");
                    GatewayError::streaming(format!("{provider}: invalid stream event: {e}"))
                })?;

                match parsed {
                    StreamEvent::MessageStart { message } => {
                        id = message.id;
                        prompt_tokens = message.usage.map_or(0, |u| u.input_tokens);
                        yield ChatChunk::new(&id, &model, ChunkDelta::assistant_start());
                    }
                    StreamEvent::ContentBlockDelta { delta: BlockDelta::TextDelta { text } } => {
                        yield ChatChunk::new(&id, &model, ChunkDelta::text(text));
                    }
                    StreamEvent::MessageDelta { delta, usage } => {
                        let completion_tokens = usage.map_or(0, |u| u.output_tokens);
                        yield ChatChunk::new(&id, &model, ChunkDelta::default())
                            .with_finish_reason(delta.stop_reason.as_deref().map(map_stop_reason))
                            .with_usage(Some(Usage::new(prompt_tokens, completion_tokens)));
                    }
                    StreamEvent::MessageStop => break,
                    StreamEvent::Error { error } => {
                        Err(GatewayError::upstream(provider, error.message, None))?;
                    }
                    StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => {}
                }
            }

            es.close();
        };

        Ok(with_cancellation(stream, cancellation))
    }
}

// ============================================================================
// Messages API types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anthropic_version: Option<&'static str>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    id: String,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::ImageUrl;
    use serde_json::Value;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn direct(base_url: &str) -> AnthropicProvider {
        AnthropicProvider::new(
            AnthropicDeployment::Direct {
                base_url: base_url.to_string(),
            },
            Some(SecretString::new("sk-ant".to_string())),
            Client::new(),
        )
    }

    fn vertex(endpoint: Option<String>) -> AnthropicProvider {
        AnthropicProvider::new(
            AnthropicDeployment::Vertex {
                project_id: "my-project".to_string(),
                region: "us-east5".to_string(),
                endpoint,
            },
            Some(SecretString::new("ya29.token".to_string())),
            Client::new(),
        )
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("claude-3-opus-20240229")
            .with_messages(&[
                ChatMessage::system("Be brief."),
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Hi"),
                ChatMessage::user("Again"),
            ])
            .with_field("temperature", json!(0.3))
            .with_field("stop", json!("END"))
    }

    fn sse(events: &[(&str, Value)]) -> String {
        events
            .iter()
            .map(|(name, data)| format!("event: {name}\ndata: {data}\n\n"))
            .collect()
    }

    #[test]
    fn test_transform_request_direct() {
        let body = direct("http://unused")
            .transform_request(&request(), false)
            .unwrap();
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "claude-3-opus-20240229");
        assert_eq!(value["system"], "Be brief.");
        assert_eq!(value["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(value["stop_sequences"], json!(["END"]));
        assert_eq!(value["messages"].as_array().unwrap().len(), 3);
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["messages"][0]["content"][0], json!({"type": "text", "text": "Hello"}));
        assert!(value.get("anthropic_version").is_none());
    }

    #[test]
    fn test_transform_request_vertex() {
        let body = vertex(None).transform_request(&request(), true).unwrap();
        let value = serde_json::to_value(&body).unwrap();

        assert!(value.get("model").is_none());
        assert_eq!(value["anthropic_version"], VERTEX_ANTHROPIC_VERSION);
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_missing_messages_is_malformed() {
        let err = direct("http://unused")
            .transform_request(&ChatCompletionRequest::new("claude-3-opus-20240229"), false)
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest { .. }));
    }

    #[test]
    fn test_data_url_images_become_base64_blocks() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "What is this?".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,iVBORw0KGgo=".to_string(),
                    detail: None,
                },
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/cat.png".to_string(),
                    detail: None,
                },
            },
        ]);

        let blocks = serde_json::to_value(convert_content(Some(&content))).unwrap();
        assert_eq!(
            blocks,
            json!([
                {"type": "text", "text": "What is this?"},
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo="}}
            ])
        );
    }

    #[test]
    fn test_vertex_endpoint_url() {
        let provider = vertex(None);
        assert_eq!(
            provider.endpoint_url("claude-3-haiku@20240307", false),
            "https://us-east5-aiplatform.googleapis.com/v1/projects/my-project/locations/us-east5/publishers/anthropic/models/claude-3-haiku@20240307:rawPredict"
        );
        assert!(provider
            .endpoint_url("claude-3-haiku@20240307", true)
            .ends_with(":streamRawPredict"));
        assert_eq!(provider.name(), "anthropic-vertex");
        assert_eq!(provider.required_credentials(), VERTEX_REQUIRED);
    }

    #[test]
    fn test_map_stop_reason() {
        assert_eq!(map_stop_reason("end_turn"), FinishReason::Stop);
        assert_eq!(map_stop_reason("stop_sequence"), FinishReason::Stop);
        assert_eq!(map_stop_reason("max_tokens"), FinishReason::Length);
        assert_eq!(map_stop_reason("tool_use"), FinishReason::ToolCalls);
        assert_eq!(map_stop_reason("refusal"), FinishReason::Other);
    }

    #[tokio::test]
    async fn test_buffered_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({"stream": false, "system": "Be brief."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": " there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = direct(&server.uri())
            .chat_completion(&request(), None)
            .await
            .unwrap();

        assert_eq!(completion.id, "msg_01");
        assert_eq!(completion.model, "claude-3-opus-20240229");
        assert_eq!(completion.content(), Some("Hello there"));
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage, Some(Usage::new(12, 3)));
    }

    #[tokio::test]
    async fn test_vertex_uses_bearer_token_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/my-project/locations/us-east5/publishers/anthropic/models/claude-3-opus@20240229:rawPredict",
            ))
            .and(header("authorization", "Bearer caller-token"))
            .and(body_partial_json(json!({"anthropic_version": VERTEX_ANTHROPIC_VERSION})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_v",
                "content": [{"type": "text", "text": "ok"}],
                "stop_reason": "max_tokens",
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatCompletionRequest::new("claude-3-opus@20240229")
            .with_messages(&[ChatMessage::user("Hi")]);
        let completion = vertex(Some(server.uri()))
            .chat_completion(&request, Some("caller-token"))
            .await
            .unwrap();
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Length));
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let err = direct(&server.uri())
            .chat_completion(&request(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 529);
        assert!(matches!(err, GatewayError::Upstream { ref message, .. } if message == "Overloaded"));
    }

    #[tokio::test]
    async fn test_stream_translates_events() {
        let body = sse(&[
            ("message_start", json!({"type": "message_start", "message": {"id": "msg_s", "usage": {"input_tokens": 9, "output_tokens": 0}}})),
            ("content_block_start", json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
            ("ping", json!({"type": "ping"})),
            ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}})),
            ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}})),
            ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
            ("message_delta", json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 2}})),
            ("message_stop", json!({"type": "message_stop"})),
        ]);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let chunks: Vec<ChatChunk> = direct(&server.uri())
            .chat_completion_stream(&request(), CancellationSignal::new(), None)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.id == "msg_s"));
        assert_eq!(chunks[0].choices[0].delta.role, Some(MessageRole::Assistant));
        assert_eq!(chunks[1].content(), Some("Hel"));
        assert_eq!(chunks[2].content(), Some("lo"));
        assert_eq!(chunks[3].choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(chunks[3].usage, Some(Usage::new(9, 2)));
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let body = sse(&[
            ("message_start", json!({"type": "message_start", "message": {"id": "msg_e"}})),
            ("error", json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
        ]);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let items: Vec<_> = direct(&server.uri())
            .chat_completion_stream(&request(), CancellationSignal::new(), None)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(GatewayError::Upstream { ref message, .. }) if message == "Overloaded"
        ));
    }
}
