//! OpenAI provider and the OpenAI-compatible wire engine.
//!
//! Any vendor that exposes `POST {base}/chat/completions` with the OpenAI
//! request and `chat.completion.chunk` SSE shapes is served by
//! [`OpenAICompatibleProvider`]; only the base URL, credential and model list
//! differ. The request body is forwarded verbatim apart from `stream`.

use crate::common::{
    decode_error, error_from_body, error_from_response, model_list, secret, select_key, setting,
    transport_error,
};
use crate::registry::ProviderContext;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    with_cancellation, CancellationSignal, ChatChunk, ChatCompletion, ChatCompletionRequest,
    ChunkStream, GatewayError, GatewayResult, ProviderAdapter,
};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{retry::Never, Error as EventSourceError, Event, EventSource};
use secrecy::SecretString;
use tracing::{debug, trace, warn};

/// Default OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Credential holding the OpenAI API key
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "o1-preview",
    "o1-mini",
];

/// Configuration of one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    /// Provider name reported in errors and `owned_by`
    pub name: String,
    /// Credentials that must be present for the provider to be active
    pub required_credentials: &'static [&'static str],
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,
    /// Configured API key
    pub api_key: Option<SecretString>,
    /// Served model identifiers
    pub models: Vec<String>,
}

impl OpenAICompatibleConfig {
    /// Create a configuration
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        required_credentials: &'static [&'static str],
        base_url: impl Into<String>,
        models: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            required_credentials,
            base_url: base_url.into(),
            api_key: None,
            models: model_list(models),
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fill key and optional base URL override from the credential mapping
    #[must_use]
    pub fn from_credentials(
        mut self,
        ctx: &ProviderContext,
        key_name: &str,
        base_url_name: &str,
    ) -> Self {
        self.api_key = secret(&ctx.credentials, key_name);
        if let Some(url) = setting(&ctx.credentials, base_url_name) {
            self.base_url = url;
        }
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Adapter for OpenAI and OpenAI-compatible vendors
#[derive(Debug, Clone)]
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    /// Create a provider using the shared HTTP client
    #[must_use]
    pub fn new(config: OpenAICompatibleConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// The OpenAI provider itself
    #[must_use]
    pub fn openai(ctx: &ProviderContext) -> Self {
        let config = OpenAICompatibleConfig::new(
            "openai",
            &[OPENAI_API_KEY],
            OPENAI_BASE_URL,
            OPENAI_MODELS,
        )
        .from_credentials(ctx, OPENAI_API_KEY, "OPENAI_BASE_URL");
        Self::new(config, ctx.http.clone())
    }

    /// Provider configuration
    #[must_use]
    pub fn config(&self) -> &OpenAICompatibleConfig {
        &self.config
    }

    fn request(&self, key: &str, body: &serde_json::Value) -> RequestBuilder {
        self.client
            .post(self.config.completions_url())
            .bearer_auth(key)
            .json(body)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn required_credentials(&self) -> &[&'static str] {
        self.config.required_credentials
    }

    fn supported_models(&self) -> &[String] {
        &self.config.models
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion> {
        let key = select_key(&self.config.name, upstream_key, self.config.api_key.as_ref())?;

        debug!(
            provider = %self.config.name,
            model = %request.model,
            "Sending chat completion request"
        );

        let builder = self.request(&key, &request.to_upstream_body(false));
        send_completion(&self.config.name, builder).await
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let key = select_key(&self.config.name, upstream_key, self.config.api_key.as_ref())?;

        debug!(
            provider = %self.config.name,
            model = %request.model,
            "Starting streaming chat completion"
        );

        let builder = self.request(&key, &request.to_upstream_body(true));
        open_chunk_stream(&self.config.name, builder, cancellation)
    }
}

/// Send a buffered OpenAI-shaped request and decode the completion.
pub(crate) async fn send_completion(
    provider: &str,
    builder: RequestBuilder,
) -> GatewayResult<ChatCompletion> {
    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    if !response.status().is_success() {
        return Err(error_from_response(provider, response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, &e))?;
    trace!(provider = %provider, body = %body, "Received completion");

    serde_json::from_str(&body).map_err(|e| decode_error(provider, e))
}

/// Open an OpenAI-shaped SSE stream. Each `data:` payload is one
/// `chat.completion.chunk`; `[DONE]` ends the sequence.
pub(crate) fn open_chunk_stream(
    provider: &str,
    builder: RequestBuilder,
    cancellation: CancellationSignal,
) -> GatewayResult<ChunkStream> {
    let mut event_source = EventSource::new(builder).map_err(|e| {
        GatewayError::upstream(provider, format!("Failed to create event source: {e}"), None)
    })?;
    event_source.set_retry_policy(Box::new(Never));

    let provider = provider.to_string();

    let stream = try_stream! {
        let mut es = event_source;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    trace!(provider = %provider, "Stream opened");
                }
                Ok(Event::Message(msg)) => {
                    let data = msg.data.trim();

                    if data == "[DONE]" {
                        break;
                    }
                    if data.is_empty() {
                        continue;
                    }

                    let chunk = serde_json::from_str::<ChatChunk>(data).map_err(|e| {
                        warn!(provider = %provider, error = %e, data = %data, "Unparsable chunk");
                        GatewayError::streaming(format!("{provider}: invalid chunk: {e}"))
                    })?;
                    yield chunk;
                }
                Err(EventSourceError::StreamEnded) => break,
                Err(EventSourceError::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    Err(error_from_body(&provider, status.as_u16(), &body))?;
                }
                Err(e) => {
                    Err(GatewayError::upstream(&provider, format!("Stream error: {e}"), None))?;
                }
            }
        }

        es.close();
    };

    Ok(with_cancellation(stream, cancellation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{ChatMessage, CredentialMapping};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, key: Option<&str>) -> OpenAICompatibleProvider {
        let config = OpenAICompatibleConfig::new("openai", &[OPENAI_API_KEY], base_url, OPENAI_MODELS)
            .with_api_key(key.map(|k| SecretString::new(k.to_string())));
        OpenAICompatibleProvider::new(config, Client::new())
    }

    fn request(stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest::new("gpt-4o")
            .with_stream(stream)
            .with_messages(&[ChatMessage::user("Hello")])
            .with_field("temperature", json!(0.5))
    }

    fn completion_body() -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })
    }

    fn sse_body(chunks: &[&str]) -> String {
        let mut body = String::new();
        for text in chunks {
            let chunk = json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": "gpt-4o",
                "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
            });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn test_openai_from_credentials() {
        let ctx = ProviderContext::new(
            CredentialMapping::from_pairs([
                (OPENAI_API_KEY, "sk-test"),
                ("OPENAI_BASE_URL", "http://localhost:9999/v1/"),
            ]),
            Client::new(),
        );
        let provider = OpenAICompatibleProvider::openai(&ctx);

        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.required_credentials(), &[OPENAI_API_KEY]);
        assert!(provider.supports_model("gpt-4o-mini"));
        assert!(!provider.supports_model("claude-3-opus-20240229"));
        assert_eq!(
            provider.config().completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_buffered_completion_forwards_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o", "stream": false, "temperature": 0.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
            .expect(1)
            .mount(&server)
            .await;

        let completion = provider(&server.uri(), Some("sk-test"))
            .chat_completion(&request(false), None)
            .await
            .unwrap();

        assert_eq!(completion.id, "chatcmpl-1");
        assert_eq!(completion.content(), Some("Hi there"));
        assert_eq!(completion.usage.unwrap().total_tokens, 7);
    }

    #[tokio::test]
    async fn test_upstream_key_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-caller"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server.uri(), Some("sk-configured"))
            .chat_completion(&request(false), Some("sk-caller"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Some("sk-test"))
            .chat_completion(&request(false), None)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 429);
        assert!(matches!(
            err,
            GatewayError::Upstream { ref provider, ref message, status: Some(429) }
                if provider == "openai" && message == "Rate limit reached"
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let err = provider("http://127.0.0.1:1", None)
            .chat_completion(&request(false), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["one", "two", "three"]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let stream = provider(&server.uri(), Some("sk-test"))
            .chat_completion_stream(&request(true), CancellationSignal::new(), None)
            .await
            .unwrap();

        let chunks: Vec<_> = stream.collect().await;
        let texts: Vec<_> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().content().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_stream_relays_vendor_fields_and_fails_on_garbage() {
        let server = MockServer::start().await;
        let reasoning = json!({
            "id": "chatcmpl-r",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "deepseek-reasoner",
            "choices": [{"index": 0, "delta": {"reasoning_content": "think"}, "finish_reason": null}],
            "x_groq": {"id": "req_1"}
        });
        let body = format!("data: {reasoning}\n\ndata: {{not json\n\n{}", sse_body(&["late"]));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let items: Vec<_> = provider(&server.uri(), Some("sk-test"))
            .chat_completion_stream(&request(true), CancellationSignal::new(), None)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap();
        assert_eq!(serde_json::to_value(first).unwrap(), reasoning);
        assert!(matches!(items[1], Err(GatewayError::Streaming { .. })));
    }

    #[tokio::test]
    async fn test_stream_error_status_surfaces_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
            )
            .mount(&server)
            .await;

        let mut stream = provider(&server.uri(), Some("sk-bad"))
            .chat_completion_stream(&request(true), CancellationSignal::new(), None)
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap_err();
        assert_eq!(first.status_code(), 401);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_stream_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["one"]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let signal = CancellationSignal::new();
        signal.cancel();
        let stream = provider(&server.uri(), Some("sk-test"))
            .chat_completion_stream(&request(true), signal, None)
            .await
            .unwrap();

        assert_eq!(stream.count().await, 0);
    }
}
