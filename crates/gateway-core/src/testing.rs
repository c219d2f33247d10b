//! Scriptable in-memory adapter for tests.

use crate::error::{GatewayError, GatewayResult};
use crate::provider::ProviderAdapter;
use crate::request::ChatCompletionRequest;
use crate::response::{ChatCompletion, FinishReason, Usage};
use crate::streaming::{
    with_cancellation, CancellationSignal, ChatChunk, ChunkDelta, ChunkStream,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the mock does after yielding its chunks
#[derive(Debug, Clone, Default)]
pub enum StreamTail {
    /// Finish normally
    #[default]
    Complete,
    /// Raise this error
    Fail(GatewayError),
    /// Never finish; only cancellation ends the stream
    Hang,
}

/// Test adapter with fixed models and scripted output
#[derive(Debug, Clone)]
pub struct MockAdapter {
    name: String,
    required: Vec<&'static str>,
    models: Vec<String>,
    chunks: Vec<String>,
    tail: StreamTail,
    buffered_error: Option<GatewayError>,
    stream_open_error: Option<GatewayError>,
    calls: Arc<AtomicUsize>,
    cancellations: Arc<AtomicUsize>,
    seen_keys: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockAdapter {
    /// Create a mock requiring `required` credentials and serving `models`
    #[must_use]
    pub fn new(name: impl Into<String>, required: &[&'static str], models: &[&str]) -> Self {
        Self {
            name: name.into(),
            required: required.to_vec(),
            models: models.iter().map(|m| (*m).to_string()).collect(),
            chunks: vec!["Hello".to_string()],
            tail: StreamTail::Complete,
            buffered_error: None,
            stream_open_error: None,
            calls: Arc::new(AtomicUsize::new(0)),
            cancellations: Arc::new(AtomicUsize::new(0)),
            seen_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Text deltas to stream, one chunk each
    #[must_use]
    pub fn with_chunks(mut self, chunks: &[&str]) -> Self {
        self.chunks = chunks.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Behaviour after the scripted chunks
    #[must_use]
    pub fn with_tail(mut self, tail: StreamTail) -> Self {
        self.tail = tail;
        self
    }

    /// Make the buffered path fail
    #[must_use]
    pub fn with_buffered_error(mut self, error: GatewayError) -> Self {
        self.buffered_error = Some(error);
        self
    }

    /// Make opening the stream fail
    #[must_use]
    pub fn with_stream_open_error(mut self, error: GatewayError) -> Self {
        self.stream_open_error = Some(error);
        self
    }

    /// Number of invocations (either path)
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of times a stream observed cancellation
    #[must_use]
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Upstream keys passed to each invocation
    #[must_use]
    pub fn seen_keys(&self) -> Vec<Option<String>> {
        self.seen_keys.lock().map(|k| k.clone()).unwrap_or_default()
    }

    fn record(&self, upstream_key: Option<&str>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut keys) = self.seen_keys.lock() {
            keys.push(upstream_key.map(String::from));
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_credentials(&self) -> &[&'static str] {
        &self.required
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion> {
        self.record(upstream_key);
        if let Some(err) = &self.buffered_error {
            return Err(err.clone());
        }
        Ok(ChatCompletion::assistant_text(
            format!("{}-completion", self.name),
            &request.model,
            self.chunks.concat(),
            Some(FinishReason::Stop),
            Some(Usage::new(1, self.chunks.len() as u32)),
        ))
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        self.record(upstream_key);
        if let Some(err) = &self.stream_open_error {
            return Err(err.clone());
        }

        // Stands in for the upstream connection: it is released exactly when
        // the signal fires.
        let counter = self.cancellations.clone();
        let watcher = cancellation.clone();
        tokio::spawn(async move {
            watcher.cancelled().await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let id = format!("{}-stream", self.name);
        let model = request.model.clone();
        let chunks: Vec<GatewayResult<ChatChunk>> = self
            .chunks
            .iter()
            .map(|text| Ok(ChatChunk::new(&id, &model, ChunkDelta::text(text))))
            .collect();
        let head = stream::iter(chunks);

        let stream = match self.tail.clone() {
            StreamTail::Complete => head.boxed(),
            StreamTail::Fail(err) => head.chain(stream::iter(vec![Err(err)])).boxed(),
            StreamTail::Hang => head.chain(stream::pending()).boxed(),
        };
        Ok(with_cancellation(stream, cancellation))
    }
}
