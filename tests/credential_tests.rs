//! Tests for the GraphQL credential provider and the shared credential cache.

use std::sync::Arc;
use std::time::Instant;

use livia::config::ChatConfig;
use livia::credential::{CredentialCache, CredentialProvider, GraphqlCredentialProvider};
use livia::error::{ChatError, CredentialError};
use livia::session::ChatSession;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> GraphqlCredentialProvider {
    GraphqlCredentialProvider::new(format!("{}/graphql", server.uri()), "s3cret")
}

#[tokio::test]
async fn fetch_sends_query_with_secret_and_reads_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "query": "query { apiKey(secret: \"s3cret\") }"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"apiKey": "sk-from-graphql"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = provider(&server).fetch().await.expect("token");
    assert_eq!(token.as_str(), "sk-from-graphql");
}

#[tokio::test]
async fn graphql_errors_are_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "invalid secret"}]
        })))
        .mount(&server)
        .await;

    let err = provider(&server).fetch().await.unwrap_err();
    assert_eq!(err, CredentialError::Rejected("invalid secret".into()));
}

#[tokio::test]
async fn missing_or_empty_key_is_missing_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"apiKey": ""}
        })))
        .mount(&server)
        .await;

    let err = provider(&server).fetch().await.unwrap_err();
    assert_eq!(err, CredentialError::MissingToken);
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = provider(&server).fetch().await.unwrap_err();
    assert_eq!(
        err,
        CredentialError::Status {
            status: 500,
            body: "internal".into()
        }
    );
}

#[tokio::test]
async fn cache_issues_one_request_for_concurrent_callers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"apiKey": "shared"}}))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = CredentialCache::new(Arc::new(provider(&server)));
    let (a, b, c) = tokio::join!(cache.token(), cache.token(), cache.token());

    assert_eq!(a.unwrap().as_str(), "shared");
    assert_eq!(b.unwrap().as_str(), "shared");
    assert_eq!(c.unwrap().as_str(), "shared");
}

#[tokio::test]
async fn malformed_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = provider(&server).fetch().await.unwrap_err();
    assert!(
        matches!(err, CredentialError::InvalidResponse(_)),
        "expected InvalidResponse, got {err:?}"
    );
}

#[tokio::test]
async fn configured_provider_gives_up_after_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"apiKey": "late"}}))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ChatConfig {
        endpoint: format!("{}/v1/chat/completions", server.uri()),
        credential_url: Some(format!("{}/graphql", server.uri())),
        credential_secret: Some("s3cret".into()),
        request_timeout_secs: 1,
        ..ChatConfig::default()
    };
    let session = ChatSession::from_config(&config).unwrap();

    let started = Instant::now();
    let err = session.send_buffered("hello").await.unwrap_err();

    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert!(
        matches!(err, ChatError::NoCredential(CredentialError::Network(_))),
        "expected a network credential failure, got {err:?}"
    );
    assert!(!session.credentials().is_present());
}
