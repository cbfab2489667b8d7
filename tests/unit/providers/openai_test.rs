/*!
 * Tests for the OpenAI chat completions client
 */

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screentrans::engine::{EngineIdentifier, EngineType};
use screentrans::errors::ProviderError;
use screentrans::providers::openai::OpenAI;
use screentrans::providers::{ProviderConfiguration, TranslationProvider, TranslationRequest, VisionProvider};

use crate::common;

fn completion(content: &str, finish_reason: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": finish_reason}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4}
    })
}

#[tokio::test]
async fn test_translate_success_shouldSendBearerAndCleanOutput() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("\"Bonjour\"\n", "stop")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAI::new(common::config_for_server(EngineType::OpenAI, &server.uri()));
    let result = provider
        .translate(TranslationRequest::new("Hello", "fr").source("en"))
        .await
        .unwrap();

    assert_eq!(result.translated_text, "Bonjour");
    assert_eq!(result.source_text, "Hello");
    assert_eq!(result.source_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_translate_rateLimited_shouldReadRetryAfterHeader() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "12")
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let provider = OpenAI::new(common::config_for_server(EngineType::OpenAI, &server.uri()));
    let error = provider.translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();

    match error {
        ProviderError::RateLimited { retry_after_secs, .. } => assert_eq!(retry_after_secs, Some(12)),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_translate_unauthorized_shouldMapToAuthenticationFailed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Incorrect API key"}})))
        .mount(&server)
        .await;

    let provider = OpenAI::new(common::config_for_server(EngineType::OpenAI, &server.uri()));
    let error = provider.translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();
    assert!(matches!(error, ProviderError::AuthenticationFailed(_)), "got {:?}", error);
}

#[tokio::test]
async fn test_translate_openaiWithoutKey_shouldFailBeforeSending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("x", "stop")))
        .expect(0)
        .mount(&server)
        .await;

    let config = ProviderConfiguration::new(EngineType::OpenAI.into()).base_url(server.uri());
    let error = OpenAI::new(config).translate(TranslationRequest::new("Hello", "fr")).await.unwrap_err();
    assert!(matches!(error, ProviderError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_translate_compatibleWithoutKey_shouldOmitAuthorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hallo", "stop")))
        .mount(&server)
        .await;

    let config = ProviderConfiguration::new(EngineIdentifier::compatible(0))
        .base_url(format!("{}/v1/", server.uri()))
        .model("qwen2.5");
    let result = OpenAI::new(config).translate(TranslationRequest::new("Hello", "de")).await.unwrap();
    assert_eq!(result.translated_text, "Hallo");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_analyze_truncatedOutput_shouldContinueAndMergeSegments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"role\":\"assistant\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"text":"World","bbox":[0.1,0.3,0.2,0.05]}]}"#,
            "stop",
        )))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"segments":[{"text":"Hello","bbox":[0.1,0.1,0.2,0.05]},"#,
            "length",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAI::new(common::config_for_server(EngineType::OpenAI, &server.uri()));
    let analysis = provider.analyze(&common::test_image(200, 100)).await.unwrap();

    let texts: Vec<&str> = analysis.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello", "World"]);
    assert_eq!(analysis.image_size.width, 200);
}

#[tokio::test]
async fn test_analyze_cutInsideString_shouldNotKeepPartialSegment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"role\":\"assistant\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"ld","bbox":[0.1,0.3,0.2,0.05]}]}"#,
            "stop",
        )))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"segments":[{"text":"Hello","bbox":[0.1,0.1,0.2,0.05]},{"text":"Wor"#,
            "length",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAI::new(common::config_for_server(EngineType::OpenAI, &server.uri()));
    let analysis = provider.analyze(&common::test_image(200, 100)).await.unwrap();

    let texts: Vec<&str> = analysis.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello", "World"]);
    let world = &analysis.segments[1].bounding_box;
    assert!((world.y - 0.3).abs() < 1e-9);
    assert!((world.height - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn test_analyze_modelMissing_shouldMapToModelUnavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "model not found"}})))
        .mount(&server)
        .await;

    let config = common::config_for_server(EngineType::OpenAI, &server.uri()).model("gpt-nope");
    let error = OpenAI::new(config).analyze(&common::test_image(40, 40)).await.unwrap_err();
    match error {
        ProviderError::ModelUnavailable(model) => assert_eq!(model, "gpt-nope"),
        other => panic!("expected ModelUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_isAvailable_compatibleWithoutVision_shouldOnlyTranslate() {
    let mut config = ProviderConfiguration::new(EngineIdentifier::compatible(2)).base_url("http://localhost:1234/v1");
    config.supports_vision = false;
    let provider = OpenAI::new(config);

    assert!(TranslationProvider::is_available(&provider).await);
    assert!(!VisionProvider::is_available(&provider).await);
}
