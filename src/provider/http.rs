//! Shared HTTP client, line splitting, SSE parsing, and status handling.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::error::ChatError;

/// Build a client with the given overall request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| ChatError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Build a client whose limit applies to connecting and to each read, not
/// to the whole response, so a long streamed reply is never cut off while
/// data keeps arriving.
pub fn build_streaming_client(idle_timeout: Duration) -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .connect_timeout(idle_timeout)
        .read_timeout(idle_timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| ChatError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Parse an SSE "data: " line, returning None for other lines and "[DONE]".
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Classify a non-2xx response.
pub fn status_to_error(status: u16, body: &str) -> ChatError {
    ChatError::BadResponse {
        status,
        message: extract_error_message(body)
            .unwrap_or_else(|| format!("request failed with status {status}")),
    }
}

/// Pull `error.message` out of a `{"error": {"message": ...}}` body.
fn extract_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorPayload,
    }
    #[derive(Deserialize)]
    struct ErrorPayload {
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a newline, so a multi-byte character split across
/// network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Take the trailing line that had no newline, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_data_requires_exact_prefix() {
        assert_eq!(parse_sse_data("data: {}"), Some("{}"));
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data("data:{}"), None);
        assert_eq!(parse_sse_data(": keep-alive"), None);
        assert_eq!(parse_sse_data("event: message"), None);
    }

    #[test]
    fn status_error_uses_structured_message() {
        let err = status_to_error(401, r#"{"error":{"message":"Incorrect API key"}}"#);
        match err {
            ChatError::BadResponse { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key");
            }
            other => panic!("expected BadResponse, got {other:?}"),
        }
    }

    #[test]
    fn status_error_falls_back_to_generic_message() {
        let err = status_to_error(502, "<html>bad gateway</html>");
        assert_eq!(
            err.to_string(),
            "Bad response (status 502): request failed with status 502"
        );
    }

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_multibyte_chars_across_chunks() {
        let bytes = "data: Ω\n".as_bytes();
        let mut buf = LineBuffer::default();
        assert!(buf.push(&bytes[..7]).is_empty());
        assert_eq!(buf.push(&bytes[7..]), vec!["data: Ω"]);
    }

    #[test]
    fn line_buffer_flushes_trailing_line() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: tail").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("data: tail"));
        assert_eq!(buf.finish(), None);
    }
}
