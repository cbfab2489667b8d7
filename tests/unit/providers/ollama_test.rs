/*!
 * Tests for the Ollama client
 */

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screentrans::engine::EngineType;
use screentrans::providers::ollama::{GenerationResponse, Ollama};
use screentrans::providers::{ProviderConfiguration, TranslationProvider, TranslationRequest};

#[tokio::test]
async fn test_translate_shouldPostGenerateWithModel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("\"model\":\"llama3.2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "response": "Ciao",
            "done": true,
            "done_reason": "stop"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfiguration::new(EngineType::Ollama.into())
        .base_url(server.uri())
        .model("llama3.2");
    let result = Ollama::new(config).translate(TranslationRequest::new("Hello", "it")).await.unwrap();
    assert_eq!(result.translated_text, "Ciao");
}

#[tokio::test]
async fn test_version_shouldDriveAvailability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.5.7"})))
        .mount(&server)
        .await;

    let provider = Ollama::new(ProviderConfiguration::new(EngineType::Ollama.into()).base_url(server.uri()));
    assert_eq!(provider.version().await.unwrap(), "0.5.7");
    assert!(TranslationProvider::is_available(&provider).await);
}

#[tokio::test]
async fn test_isAvailable_serverDown_shouldBeFalse() {
    let provider = Ollama::new(ProviderConfiguration::new(EngineType::Ollama.into()).base_url("http://127.0.0.1:9"));
    assert!(!TranslationProvider::is_available(&provider).await);
}

#[test]
fn test_fromBody_streamedChunks_shouldConcatenate() {
    let body = concat!(
        "{\"response\":\"Bon\",\"done\":false}\n",
        "{\"response\":\"jour\",\"done\":true,\"done_reason\":\"stop\"}\n"
    );
    let response = GenerationResponse::from_body(body).unwrap();
    assert_eq!(response.response, "Bonjour");
    assert!(response.done);
    assert!(!response.is_truncated());
}
