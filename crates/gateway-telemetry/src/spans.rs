//! Span helpers shared by the server and provider calls.

use tracing::Span;

/// Span covering one provider invocation.
///
/// ```rust,ignore
/// let span = provider_span!(adapter.name(), request.model, stream = true);
/// adapter.chat_completion(&request, key).instrument(span).await
/// ```
#[macro_export]
macro_rules! provider_span {
    ($provider:expr, $model:expr) => {
        $crate::__tracing::info_span!(
            "provider_call",
            provider = %$provider,
            model = %$model
        )
    };
    ($provider:expr, $model:expr, $($fields:tt)+) => {
        $crate::__tracing::info_span!(
            "provider_call",
            provider = %$provider,
            model = %$model,
            $($fields)+
        )
    };
}

/// Span covering one inbound chat completion
#[must_use]
pub fn request_span(request_id: &str, model: &str, stream: bool) -> Span {
    tracing::info_span!(
        "chat_completion",
        request_id = %request_id,
        model = %model,
        stream,
        provider = tracing::field::Empty,
    )
}

/// Record the provider chosen for a request span
pub fn record_provider(span: &Span, provider: &str) {
    span.record("provider", provider);
}
