//! Helpers shared by every adapter: credential selection, upstream error
//! mapping and line-oriented stream framing.

use gateway_core::{CredentialMapping, GatewayError, GatewayResult};
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

/// Pick the upstream credential: the caller's `x-api-key` wins over the
/// configured secret.
pub(crate) fn select_key(
    provider: &str,
    upstream_key: Option<&str>,
    configured: Option<&SecretString>,
) -> GatewayResult<String> {
    if let Some(key) = upstream_key.filter(|k| !k.is_empty()) {
        debug!(provider = %provider, "Using caller-supplied upstream key");
        return Ok(key.to_string());
    }
    configured
        .map(|s| s.expose_secret().clone())
        .ok_or_else(|| {
            GatewayError::configuration(format!("No upstream credential for provider {provider}"))
        })
}

/// Read an optional secret out of the credential mapping.
pub(crate) fn secret(credentials: &CredentialMapping, key: &str) -> Option<SecretString> {
    credentials.get(key).cloned()
}

/// Read an optional plain setting out of the credential mapping. Blank
/// values count as unset.
pub(crate) fn setting(credentials: &CredentialMapping, key: &str) -> Option<String> {
    credentials
        .expose(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub(crate) fn model_list(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| (*m).to_string()).collect()
}

pub(crate) fn completion_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Map a transport failure (connect, timeout, body read).
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> GatewayError {
    warn!(provider = %provider, error = %err, "Upstream request failed");
    GatewayError::upstream(
        provider,
        format!("Request failed: {err}"),
        err.status().map(|s| s.as_u16()),
    )
}

/// Map a response body that could not be decoded.
pub(crate) fn decode_error(provider: &str, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::upstream(provider, format!("Invalid response: {err}"), None)
}

/// Turn a non-2xx upstream response into an error carrying its status.
pub(crate) async fn error_from_response(provider: &str, response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error_from_body(provider, status, &body)
}

pub(crate) fn error_from_body(provider: &str, status: u16, body: &str) -> GatewayError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        }
    });
    warn!(provider = %provider, status, message = %message, "Upstream returned an error");
    GatewayError::upstream(provider, message, Some(status))
}

/// Pull a human readable message out of the common vendor error shapes:
/// `{"error":{"message":..}}`, `{"error":".."}` and `{"message":..}`.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorBody {
        Nested { error: NestedError },
        Flat { error: String },
        Message { message: String },
    }

    #[derive(Deserialize)]
    struct NestedError {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body).ok()? {
        ErrorBody::Nested { error } => Some(error.message),
        ErrorBody::Flat { error } => Some(error),
        ErrorBody::Message { message } => Some(message),
    }
}

/// Accumulates raw bytes and hands out complete lines.
///
/// Lines are decoded only once their terminator has arrived, so a multi-byte
/// character split across network reads stays intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line without its terminator, skipping blank lines
    pub(crate) fn next_line(&mut self) -> Option<String> {
        loop {
            let pos = self.buffer.iter().position(|b| *b == b'\n')?;
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                return Some(line.to_string());
            }
        }
    }

    /// Whatever is left once the upstream closes
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_shapes() {
        assert_eq!(
            extract_message(r#"{"error":{"message":"bad key","type":"auth"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            extract_message(r#"{"error":"quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            extract_message(r#"{"message":"invalid request"}"#).as_deref(),
            Some("invalid request")
        );
        assert_eq!(extract_message("<html>oops</html>"), None);
    }

    #[test]
    fn test_error_from_body_keeps_status() {
        let err = error_from_body("openai", 429, r#"{"error":{"message":"slow down"}}"#);
        assert_eq!(err.status_code(), 429);
        assert!(matches!(err, GatewayError::Upstream { ref message, .. } if message == "slow down"));

        let err = error_from_body("openai", 502, "");
        assert!(matches!(err, GatewayError::Upstream { ref message, .. } if message == "HTTP 502"));
    }

    #[test]
    fn test_select_key_prefers_override() {
        let configured = SecretString::new("configured".to_string());
        assert_eq!(
            select_key("p", Some("override"), Some(&configured)).unwrap(),
            "override"
        );
        assert_eq!(select_key("p", None, Some(&configured)).unwrap(), "configured");
        assert_eq!(select_key("p", Some(""), Some(&configured)).unwrap(), "configured");
        assert!(select_key("p", None, None).is_err());
    }

    #[test]
    fn test_line_buffer_splits_partial_input() {
        let mut lines = LineBuffer::default();
        lines.push(b"{\"a\":1}\r\n\n{\"b\"");
        assert_eq!(lines.next_line().as_deref(), Some("{\"a\":1}"));
        assert_eq!(lines.next_line(), None);

        lines.push(b":2}\n{\"c\":3}");
        assert_eq!(lines.next_line().as_deref(), Some("{\"b\":2}"));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish().as_deref(), Some("{\"c\":3}"));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_line_buffer_keeps_split_multibyte_characters() {
        let line = "{\"text\":\"héllo 你好\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xc3).unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.push(&line[..split]);
        assert_eq!(lines.next_line(), None);
        lines.push(&line[split..]);
        assert_eq!(lines.next_line().as_deref(), Some("{\"text\":\"héllo 你好\"}"));

        let tail = "再见".as_bytes();
        lines.push(&tail[..2]);
        lines.push(&tail[2..]);
        assert_eq!(lines.finish().as_deref(), Some("再见"));
    }

    #[test]
    fn test_setting_treats_blank_as_unset() {
        let creds = CredentialMapping::from_pairs([("OPENAI_BASE_URL", " "), ("GROQ_BASE_URL", "http://x")]);
        assert_eq!(setting(&creds, "OPENAI_BASE_URL"), None);
        assert_eq!(setting(&creds, "GROQ_BASE_URL").as_deref(), Some("http://x"));
    }
}
