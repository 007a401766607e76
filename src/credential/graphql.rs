//! Credential provider backed by a GraphQL `apiKey` query.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{BearerToken, CredentialProvider};
use crate::error::CredentialError;

/// Fetches the chat API key with a single GraphQL POST carrying a shared secret.
///
/// The endpoint answers `{"data": {"apiKey": "<token>"}}`.
///
/// # Example
/// ```no_run
/// use livia::credential::{CredentialProvider, GraphqlCredentialProvider};
///
/// # async fn example() -> Result<(), livia::error::CredentialError> {
/// let provider = GraphqlCredentialProvider::new("https://example.com/graphql", "shared-secret");
/// let token = provider.fetch().await?;
/// # Ok(())
/// # }
/// ```
pub struct GraphqlCredentialProvider {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl GraphqlCredentialProvider {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            secret: secret.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn query(&self) -> String {
        // A JSON string literal is a valid GraphQL string literal.
        let secret = serde_json::Value::String(self.secret.clone());
        format!("query {{ apiKey(secret: {secret}) }}")
    }
}

#[async_trait]
impl CredentialProvider for GraphqlCredentialProvider {
    async fn fetch(&self) -> Result<BearerToken, CredentialError> {
        debug!(url = %self.url, "requesting api key");

        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "query": self.query() }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CredentialError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let payload: GraphqlResponse = serde_json::from_slice(&body)?;
        if let Some(error) = payload.errors.into_iter().next() {
            return Err(CredentialError::Rejected(error.message));
        }

        match payload.data.and_then(|d| d.api_key) {
            Some(key) if !key.is_empty() => Ok(BearerToken::new(key)),
            _ => Err(CredentialError::MissingToken),
        }
    }
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<ApiKeyData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct ApiKeyData {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}
