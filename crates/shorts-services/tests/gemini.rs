//! Gemini client against a mock server.

use std::time::Duration;

use serde_json::json;
use shorts_services::{GeminiClient, GeminiConfig, ServiceError, TextGenerator};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, models: &[&str]) -> GeminiConfig {
    GeminiConfig {
        api_key: "test-key".into(),
        base_url: server.uri(),
        models: models.iter().map(|m| m.to_string()).collect(),
        temperature: 0.5,
        timeout: Duration::from_secs(5),
        max_retries: 0,
    }
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    })
}

#[tokio::test]
async fn falls_back_to_next_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-b:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(r#"{"title":"t"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new(config(&server, &["model-a", "model-b"])).unwrap();
    let text = client.generate("prompt").await.unwrap();
    assert_eq!(text, r#"{"title":"t"}"#);
}

#[tokio::test]
async fn last_error_is_returned_when_all_models_fail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-b:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = GeminiClient::new(config(&server, &["model-a", "model-b"])).unwrap();
    let err = client.generate("prompt").await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_candidates_are_invalid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = GeminiClient::new(config(&server, &["model-a"])).unwrap();
    let err = client.generate("prompt").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse(_)));
}
