//! Route definitions for the gateway API.

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{auth, error, handlers, state::AppState};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.snapshot().cors_origin.as_deref());

    Router::new()
        .route("/health", get(handlers::health_check))
        // OpenAI-compatible endpoints
        .nest("/v1", openai_routes())
        // Apply middleware, innermost first
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(from_fn(chat_preflight))
        .with_state(state)
}

/// OpenAI-compatible API routes
fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(handlers::chat_completion))
        .route("/models", get(handlers::list_models))
}

/// `OPTIONS /v1/chat/completions` answers `{"body":"ok"}`.
///
/// `CorsLayer` short-circuits every `OPTIONS` request with an empty body, so
/// this sits outside it and keeps the CORS headers it produced.
async fn chat_preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS || request.uri().path() != CHAT_COMPLETIONS_PATH {
        return next.run(request).await;
    }

    let cors = next.run(request).await;
    let mut response = handlers::preflight().await.into_response();
    for (name, value) in cors.headers() {
        if *name != header::CONTENT_LENGTH && *name != header::CONTENT_TYPE {
            response.headers_mut().append(name, value.clone());
        }
    }
    response
}

/// CORS policy allowing `origin`, or any origin when unset
pub fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    match origin {
        None => layer.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                warn!(origin = %origin, "CORS_ORIGIN is not a valid header value; allowing any origin");
                layer.allow_origin(Any)
            }
        },
    }
}
