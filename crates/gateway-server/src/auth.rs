//! # Access Key Gate
//!
//! Every route except `/health` and `OPTIONS` requests requires
//! `Authorization: Bearer <API_KEY>`. A gateway started without an access key
//! rejects every gated request.
//!
//! Keys are compared as SHA-256 digests so the comparison does not depend on
//! where the first differing byte is.

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gateway_core::{GatewayError, GatewayResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

/// Paths served without a token
pub const PUBLIC_PATHS: &[&str] = &["/health"];

const BEARER_PREFIX: &str = "Bearer ";

/// Check an `Authorization` header value against the configured key
///
/// # Errors
/// Returns [`GatewayError::Unauthorized`] for a missing or malformed header,
/// a wrong token, or when no key is configured
pub fn authorize(header: Option<&str>, expected: Option<&SecretString>) -> GatewayResult<()> {
    let expected = expected.ok_or(GatewayError::Unauthorized)?;
    let token = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(GatewayError::Unauthorized)?;

    if digest(token) == digest(expected.expose_secret()) {
        Ok(())
    } else {
        Err(GatewayError::Unauthorized)
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}

/// Whether a request skips the gate
#[must_use]
pub fn is_exempt(method: &Method, path: &str) -> bool {
    method == Method::OPTIONS || PUBLIC_PATHS.contains(&path)
}

/// Authentication middleware
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_exempt(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let config = state.config.snapshot();
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match authorize(header, config.api_key.as_ref()) {
        Ok(()) => {
            debug!(path = %request.uri().path(), "Request authenticated");
            next.run(request).await
        }
        Err(err) => {
            if config.api_key.is_none() {
                warn!(path = %request.uri().path(), "Rejecting request: no API_KEY configured");
            } else {
                warn!(path = %request.uri().path(), has_header = header.is_some(), "Authentication failed");
            }
            ApiError::from(err).into_response()
        }
    }
}
