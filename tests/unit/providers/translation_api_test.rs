/*!
 * Tests for the machine translation APIs: DeepL, Google and MTranServer
 */

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screentrans::engine::EngineType;
use screentrans::errors::ProviderError;
use screentrans::providers::deepl::{DeepL, deepl_base_url};
use screentrans::providers::google::GoogleTranslate;
use screentrans::providers::mtran::MtranServer;
use screentrans::providers::{ProviderConfiguration, TranslationProvider, TranslationRequest};

use crate::common;

#[tokio::test]
async fn test_deeplBatch_shouldSkipBlankTextsAndKeepOrder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .and(header("authorization", "DeepL-Auth-Key test-key"))
        .and(body_string_contains("\"target_lang\":\"DE\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [
                {"detected_source_language": "EN", "text": "Datei"},
                {"detected_source_language": "EN", "text": "Bearbeiten"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = DeepL::new(common::config_for_server(EngineType::DeepL, &server.uri()));
    let texts = vec!["File".to_string(), "  ".to_string(), "Edit".to_string()];
    let results = provider.translate_batch(&texts, None, "de", None).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].translated_text, "Datei");
    assert_eq!(results[1].translated_text, "  ");
    assert_eq!(results[2].translated_text, "Bearbeiten");
    assert_eq!(results[0].source_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_deeplQuotaExceeded_shouldMapToRateLimited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
        .mount(&server)
        .await;

    let provider = DeepL::new(common::config_for_server(EngineType::DeepL, &server.uri()));
    let error = provider.translate(TranslationRequest::new("File", "de")).await.unwrap_err();
    match error {
        ProviderError::RateLimited { message, .. } => assert_eq!(message.as_deref(), Some("DeepL quota exceeded")),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deeplCountMismatch_shouldBeInvalidResponse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translations": []})))
        .mount(&server)
        .await;

    let provider = DeepL::new(common::config_for_server(EngineType::DeepL, &server.uri()));
    let error = provider.translate(TranslationRequest::new("File", "de")).await.unwrap_err();
    assert!(matches!(error, ProviderError::InvalidResponse(_)), "got {:?}", error);
}

#[test]
fn test_deeplBaseUrl_shouldPickHostFromKeySuffix() {
    assert_eq!(deepl_base_url("abc:fx", ""), "https://api-free.deepl.com");
    assert_eq!(deepl_base_url("abc", ""), "https://api.deepl.com");
    assert_eq!(deepl_base_url("abc:fx", "http://localhost:3000/"), "http://localhost:3000");
}

#[tokio::test]
async fn test_googleTranslate_shouldSendKeyAndReturnDetectedLanguage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("\"target\":\"ja\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"translations": [{"translatedText": "こんにちは", "detectedSourceLanguage": "en"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleTranslate::new(common::config_for_server(EngineType::Google, &server.uri()));
    let result = provider.translate(TranslationRequest::new("Hello", "ja")).await.unwrap();

    assert_eq!(result.translated_text, "こんにちは");
    assert_eq!(result.source_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_googleServerError_shouldBeHttpError() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": {"message": "Backend unavailable"}})))
        .mount(&server)
        .await;

    let provider = GoogleTranslate::new(common::config_for_server(EngineType::Google, &server.uri()));
    let error = provider.translate(TranslationRequest::new("Hello", "ja")).await.unwrap_err();
    assert!(matches!(error, ProviderError::HttpError { status_code: 503, .. }), "got {:?}", error);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_mtranTranslate_shouldAcceptLegacyResultField() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(body_string_contains("\"to\":\"fr\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "Bonjour"})))
        .mount(&server)
        .await;

    let config = ProviderConfiguration::new(EngineType::MtranServer.into()).base_url(server.uri());
    let result = MtranServer::new(config).translate(TranslationRequest::new("Hello", "fr")).await.unwrap();
    assert_eq!(result.translated_text, "Bonjour");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_mtranHealth_shouldDriveAvailability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let up = MtranServer::new(ProviderConfiguration::new(EngineType::MtranServer.into()).base_url(server.uri()));
    assert!(up.is_available().await);

    let down = MtranServer::new(ProviderConfiguration::new(EngineType::MtranServer.into()).base_url("http://127.0.0.1:9"));
    assert!(!down.is_available().await);
}
