//! Error normalization.
//!
//! Anything implementing [`Fault`] becomes an [`ApiError`]: the fault's
//! status when it is a valid error status, otherwise 500, and a
//! `{"message": ...}` body. Gate and dispatch rejections keep the
//! `{"error": ...}` body clients of the gateway already depend on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{Fault, GatewayError};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Description used when a fault has none (or producing it failed)
pub const FALLBACK_MESSAGE: &str = "Internal Server Error";

/// Normalized error response
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// Normalize any fault.
    pub fn from_fault<F: Fault + ?Sized>(fault: &F) -> Self {
        let status = catch_unwind(AssertUnwindSafe(|| fault.status()))
            .ok()
            .flatten()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = catch_unwind(AssertUnwindSafe(|| fault.description()))
            .ok()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        Self {
            status,
            body: json!({ "message": message }),
        }
    }

    /// 401 `{"error":"Unauthorized"}`
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: json!({ "error": "Unauthorized" }),
        }
    }

    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Human-readable text carried by the body
    #[must_use]
    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .or_else(|| self.body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or(FALLBACK_MESSAGE)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::unauthorized(),
            GatewayError::ModelNotSupported { .. } => Self {
                status: StatusCode::BAD_REQUEST,
                body: json!({ "error": err.to_string() }),
            },
            other => Self::from_fault(&other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Response for a handler that panicked
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let api_error = ApiError::from_fault(&payload);
    error!(message = %api_error.message(), "Handler panicked");
    api_error.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    struct Scripted {
        status: Option<u16>,
        description: &'static str,
    }

    impl Fault for Scripted {
        fn status(&self) -> Option<u16> {
            self.status
        }

        fn description(&self) -> String {
            self.description.to_string()
        }
    }

    struct Exploding;

    impl Fault for Exploding {
        fn status(&self) -> Option<u16> {
            Some(503)
        }

        fn description(&self) -> String {
            panic!("description blew up")
        }
    }

    #[test]
    fn test_unauthorized_envelope() {
        let err = ApiError::from(GatewayError::Unauthorized);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.body(), &json!({"error": "Unauthorized"}));
    }

    #[test]
    fn test_model_not_supported_envelope() {
        let err = ApiError::from(GatewayError::model_not_supported("b-1"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body(), &json!({"error": "Model b-1 not supported"}));
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = ApiError::from(GatewayError::upstream("openai", "Rate limit reached", Some(429)));
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body(), &json!({"message": "Rate limit reached"}));

        let err = ApiError::from(GatewayError::upstream("openai", "connection reset", None));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_status_falls_back() {
        let err = ApiError::from_fault(&Scripted { status: Some(200), description: "odd" });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from_fault(&Scripted { status: Some(42), description: "odd" });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "odd");
    }

    #[test]
    fn test_empty_description_falls_back() {
        let err = ApiError::from_fault(&Scripted { status: Some(502), description: "  " });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_panicking_description_is_contained() {
        let err = ApiError::from_fault(&Exploding);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_malformed_request_is_500() {
        let err = ApiError::from(GatewayError::malformed("expected value at line 1 column 1"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("expected value"));
    }

    #[test]
    fn test_std_faults() {
        let json_err = serde_json::from_str::<Value>("{").unwrap_err();
        let err = ApiError::from_fault(&json_err);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().is_empty());

        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert_eq!(ApiError::from_fault(&io_err).message(), "pipe closed");
    }

    #[tokio::test]
    async fn test_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let response = handle_panic(payload);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"message": "boom"}));

        let payload: Box<dyn Any + Send> = Box::new(17_u32);
        let response = handle_panic(payload);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"message": FALLBACK_MESSAGE}));
    }
}
