//! HTTP request handlers for the gateway API.

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{CancellationSignal, ChatCompletionRequest, ModelObject, ModelsResponse};
use gateway_routing::resolve;
use gateway_telemetry::{provider_span, record_provider, request_span};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::{
    error::ApiError,
    extractors::{RequestId, UpstreamKey},
    state::AppState,
    streaming::sse_response,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// CORS preflight for chat completions
pub async fn preflight() -> Json<Value> {
    Json(json!({ "body": "ok" }))
}

/// List models endpoint (OpenAI compatible).
///
/// One entry per (model, provider) pair across the active providers, in
/// catalog order. A model several providers claim appears once per claimant.
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let config = state.config.snapshot();
    let active = state.registry.active_adapters(&state.provider_context(&config));
    let created = chrono::Utc::now().timestamp();

    let data: Vec<ModelObject> = active
        .iter()
        .flat_map(|adapter| {
            adapter
                .supported_models()
                .iter()
                .map(move |model| ModelObject::new(model, adapter.name(), created))
        })
        .collect();

    debug!(providers = active.len(), models = data.len(), "Listed models");
    Json(ModelsResponse::new(data))
}

/// Chat completion endpoint (OpenAI compatible)
pub async fn chat_completion(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    UpstreamKey(upstream_key): UpstreamKey,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = ChatCompletionRequest::from_slice(&body).map_err(|err| {
        warn!(request_id = %request_id, error = %err, "Rejected malformed request");
        err
    })?;

    let span = request_span(&request_id, &request.model, request.stream);
    dispatch(state, request, upstream_key, span.clone())
        .instrument(span)
        .await
}

async fn dispatch(
    state: AppState,
    request: ChatCompletionRequest,
    upstream_key: Option<String>,
    span: tracing::Span,
) -> Result<Response, ApiError> {
    let config = state.config.snapshot();
    let active = state.registry.active_adapters(&state.provider_context(&config));
    let adapter = resolve(&request.model, &active).map_err(|err| {
        info!(active = active.len(), "No active provider for model");
        err
    })?;
    record_provider(&span, adapter.name());

    let start = Instant::now();

    if request.stream {
        let cancellation = CancellationSignal::new();
        let stream = adapter
            .chat_completion_stream(&request, cancellation.clone(), upstream_key.as_deref())
            .instrument(provider_span!(adapter.name(), request.model, stream = true))
            .await?;
        debug!(elapsed_ms = start.elapsed().as_millis(), "Upstream stream opened");
        sse_response(stream, cancellation).await
    } else {
        let completion = adapter
            .chat_completion(&request, upstream_key.as_deref())
            .instrument(provider_span!(adapter.name(), request.model, stream = false))
            .await?;
        info!(
            duration_ms = start.elapsed().as_millis(),
            "Chat completion successful"
        );
        Ok(Json(completion).into_response())
    }
}
