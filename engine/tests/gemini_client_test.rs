//! Integration tests for the Gemini client
//!
//! Validates request/response handling and status-code error mapping
//! using mock servers.

use serde_json::json;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowr_engine::config::GenerativeConfig;
use flowr_engine::generative::gemini::GeminiClient;
use flowr_engine::generative::{GenerativeClient, GenerativeError, GenerativeRequest};

fn client_for(server: &MockServer, key_env: &str) -> GeminiClient {
    std::env::set_var(key_env, "test-key");
    GeminiClient::new(GenerativeConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        api_key_env: key_env.to_string(),
    })
}

#[tokio::test]
async fn test_generate_flattens_candidate_parts() {
    let server = MockServer::start().await;

    let body = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Hello "},
                    {"text": "world"}
                ]
            }
        }]
    });

    Mock::given(method("POST"))
        .and(path_regex(r"^/models/test-model:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client_for(&server, "FLOWR_TEST_GEMINI_KEY_OK");
    let response = client
        .generate(&GenerativeRequest::with_system("system framing", "prompt"))
        .await
        .unwrap();

    assert_eq!(response, "Hello world");
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, "FLOWR_TEST_GEMINI_KEY_500");
    let err = client
        .generate(&GenerativeRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerativeError::Unavailable(_)));
}

#[tokio::test]
async fn test_rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = client_for(&server, "FLOWR_TEST_GEMINI_KEY_429");
    let err = client
        .generate(&GenerativeRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerativeError::RateLimited));
}

#[tokio::test]
async fn test_forbidden_maps_to_authentication_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = client_for(&server, "FLOWR_TEST_GEMINI_KEY_403");
    let err = client
        .generate(&GenerativeRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerativeError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_empty_candidates_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, "FLOWR_TEST_GEMINI_KEY_EMPTY");
    let err = client
        .generate(&GenerativeRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerativeError::Parse(_)));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_network() {
    // No mock server needed: the key check happens first
    let client = GeminiClient::new(GenerativeConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        model: "test-model".to_string(),
        api_key_env: "FLOWR_TEST_GEMINI_KEY_UNSET".to_string(),
    });

    let err = client
        .generate(&GenerativeRequest::new("prompt"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerativeError::AuthenticationFailed(_)));
}
