/*!
 * Tests for the PaddleOCR serving transport
 */

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screentrans::app_config::PaddleMode;
use screentrans::engine::EngineType;
use screentrans::errors::ProviderError;
use screentrans::providers::paddle::{PaddleOcr, resolve_command};
use screentrans::providers::{ProviderConfiguration, VisionProvider};

use crate::common;

fn serving_config(uri: &str) -> ProviderConfiguration {
    let mut config = ProviderConfiguration::new(EngineType::PaddleOcr.into()).base_url(uri);
    config.paddle_mode = PaddleMode::LocalServer;
    config
}

fn serving_body() -> serde_json::Value {
    json!({
        "logId": "a1",
        "errorCode": 0,
        "errorMsg": "Success",
        "result": {"ocrResults": [{"prunedResult": {
            "rec_texts": ["Hello", "World"],
            "rec_scores": [0.98, 0.87],
            "rec_boxes": [[10, 20, 110, 40], [12, 60, 90, 80]]
        }}]}
    })
}

#[tokio::test]
async fn test_localServer_shouldNormalizePixelBoxes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .and(body_string_contains("\"fileType\":1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serving_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = PaddleOcr::new(serving_config(&server.uri()));
    let analysis = provider.analyze(&common::test_image(200, 100)).await.unwrap();

    assert_eq!(analysis.segments.len(), 2);
    let first = &analysis.segments[0];
    assert_eq!(first.text, "Hello");
    assert!((first.bounding_box.x - 0.05).abs() < 1e-9);
    assert!((first.bounding_box.y - 0.2).abs() < 1e-9);
    assert!((first.bounding_box.width - 0.5).abs() < 1e-9);
    assert!((first.bounding_box.height - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_cloud_shouldSendTokenHeader() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .and(header("authorization", "token test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serving_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = serving_config(&server.uri()).api_key("test-key");
    config.use_cloud = true;
    let provider = PaddleOcr::new(config);

    assert!(provider.is_available().await);
    let analysis = provider.analyze(&common::test_image(200, 100)).await.unwrap();
    assert_eq!(analysis.segments[1].text, "World");
}

#[tokio::test]
async fn test_cloudWithoutToken_shouldBeUnavailable() {
    let mut config = serving_config("https://paddle.example.com");
    config.use_cloud = true;
    assert!(!PaddleOcr::new(config).is_available().await);
}

#[tokio::test]
async fn test_nonZeroErrorCode_shouldBeInvalidResponse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": 500,
            "errorMsg": "inference failed"
        })))
        .mount(&server)
        .await;

    let provider = PaddleOcr::new(serving_config(&server.uri()));
    let error = provider.analyze(&common::test_image(20, 20)).await.unwrap_err();
    match error {
        ProviderError::InvalidResponse(message) => assert!(message.contains("inference failed")),
        other => panic!("expected InvalidResponse, got {:?}", other),
    }
}

fn cli_config(command: &str) -> ProviderConfiguration {
    let mut config = ProviderConfiguration::new(EngineType::PaddleOcr.into());
    config.paddle_mode = PaddleMode::Cli;
    config.command = Some(command.to_string());
    config
}

#[tokio::test]
async fn test_cli_missingBinary_shouldBeUnavailable() {
    let absolute = PaddleOcr::new(cli_config("/nonexistent/paddleocr-xyz"));
    assert!(!absolute.is_available().await);

    let bare = PaddleOcr::new(cli_config("paddleocr-not-installed-xyz"));
    assert!(!bare.is_available().await);

    let error = absolute.analyze(&common::test_image(20, 20)).await.unwrap_err();
    match error {
        ProviderError::InvalidConfiguration(message) => assert!(message.contains("/nonexistent/paddleocr-xyz")),
        other => panic!("expected InvalidConfiguration, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cli_existingBinary_shouldBeAvailable() {
    let binary = tempfile::NamedTempFile::new().unwrap();
    let command = binary.path().to_string_lossy().into_owned();
    assert!(resolve_command(&command).is_some());
    assert!(PaddleOcr::new(cli_config(&command)).is_available().await);
}
