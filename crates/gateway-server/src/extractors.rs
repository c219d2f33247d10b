//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use std::convert::Infallible;

/// Header carrying a per-request upstream credential
pub const UPSTREAM_KEY_HEADER: &str = "x-api-key";

/// Request ID from `x-request-id` (or `x-correlation-id`), generated when absent
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-request-id")
            .or_else(|| parts.headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

/// Upstream credential override from `x-api-key`, forwarded verbatim.
///
/// Unrelated to the gateway's own `Authorization` check.
#[derive(Debug, Clone, Default)]
pub struct UpstreamKey(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UpstreamKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(UPSTREAM_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Ok(Self(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/chat/completions");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_request_id_from_header() {
        let mut parts = parts(&[("x-request-id", "req-42")]);
        let RequestId(id) = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, "req-42");
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let mut parts = parts(&[]);
        let RequestId(id) = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_upstream_key() {
        let mut with_key = parts(&[("x-api-key", "sk-caller")]);
        let UpstreamKey(key) = UpstreamKey::from_request_parts(&mut with_key, &()).await.unwrap();
        assert_eq!(key.as_deref(), Some("sk-caller"));

        let mut without = parts(&[("authorization", "Bearer gateway")]);
        let UpstreamKey(key) = UpstreamKey::from_request_parts(&mut without, &()).await.unwrap();
        assert!(key.is_none());
    }
}
