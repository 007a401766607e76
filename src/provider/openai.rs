//! OpenAI-compatible Chat Completions provider.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::ChatConfig;
use crate::credential::BearerToken;
use crate::error::ChatError;
use crate::types::{ChatMessage, TextChunk, TextStream};

use super::http::{
    bearer_headers, build_streaming_client, parse_sse_data, status_to_error, LineBuffer,
};
use super::{ChatProvider, ChatRequest};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.5;

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
}

impl OpenAiChatProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = build_streaming_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(config.endpoint.clone(), config.model.clone())
            .with_temperature(config.temperature)
            .with_client(client))
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn build_request_body<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> CompletionBody<'a> {
        CompletionBody {
            model: &self.model,
            temperature: request.temperature.unwrap_or(self.temperature),
            stream,
            messages: &request.messages,
        }
    }

    async fn post(
        &self,
        token: &BearerToken,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ChatError> {
        let body = self.build_request_body(request, stream);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            stream,
            "chat completion request"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(bearer_headers(token.as_str()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body_text, "chat completion rejected");
            return Err(status_to_error(status.as_u16(), &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, token: &BearerToken, request: &ChatRequest) -> Result<String, ChatError> {
        let resp = self.post(token, request, false).await?;
        let bytes = resp.bytes().await?;
        let data: CompletionResponse = serde_json::from_slice(&bytes)?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::decode("no choices in completion response"))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, token: &BearerToken, request: &ChatRequest) -> Result<TextStream, ChatError> {
        let resp = self.post(token, request, true).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            let mut failed = false;
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChatError::from(e));
                        failed = true;
                        break;
                    }
                };

                for line in lines.push(&chunk) {
                    if let Some(text) = decode_stream_line(&line) {
                        yield Ok(TextChunk::new(text));
                    }
                }
            }

            if !failed {
                if let Some(line) = lines.finish() {
                    if let Some(text) = decode_stream_line(&line) {
                        yield Ok(TextChunk::new(text));
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Extract the first choice's content fragment from one stream line.
///
/// Lines that are not `data: ` events, or whose payload is not a valid chunk,
/// yield nothing.
pub fn decode_stream_line(line: &str) -> Option<String> {
    let data = parse_sse_data(line)?;
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!(error = %e, "skipping malformed stream line");
            return None;
        }
    };
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
}

// Wire types (internal)

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    temperature: f64,
    stream: bool,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_body_has_wire_shape() {
        let provider = OpenAiChatProvider::new(DEFAULT_ENDPOINT, "gpt-test").with_temperature(0.2);
        let request = ChatRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);

        let body = serde_json::to_value(provider.build_request_body(&request, true)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-test",
                "temperature": 0.2,
                "stream": true,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"},
                ],
            })
        );
    }

    #[test]
    fn request_temperature_overrides_provider_default() {
        let provider = OpenAiChatProvider::new(DEFAULT_ENDPOINT, "gpt-test");
        let request = ChatRequest::builder()
            .messages(vec![ChatMessage::user("hi")])
            .temperature(1.0)
            .build();

        let body = serde_json::to_value(provider.build_request_body(&request, false)).unwrap();
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn decode_stream_line_extracts_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"The"}}]}"#;
        assert_eq!(decode_stream_line(line).as_deref(), Some("The"));
    }

    #[test]
    fn decode_stream_line_skips_noise() {
        assert_eq!(decode_stream_line("data: {not json"), None);
        assert_eq!(decode_stream_line("data: [DONE]"), None);
        assert_eq!(decode_stream_line(r#"{"choices":[{"delta":{"content":"x"}}]}"#), None);
        assert_eq!(decode_stream_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), None);
        assert_eq!(decode_stream_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(decode_stream_line(r#"data: {"choices":[]}"#), None);
    }
}
