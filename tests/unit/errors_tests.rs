/*!
 * Tests for error types and conversions
 */

use std::time::Duration;

use screentrans::engine::{EngineIdentifier, EngineType};
use screentrans::errors::{AppError, ErrorKind, ProviderError, Remedy, TranslationError};

#[test]
fn test_providerError_rateLimited_shouldDisplayRetryHint() {
    let error = ProviderError::RateLimited {
        retry_after_secs: Some(12),
        message: Some("slow down".to_string()),
    };
    let display = format!("{}", error);
    assert!(display.contains("Rate limit exceeded"));
    assert!(display.contains("retry after 12s"));
    assert!(display.contains("slow down"));
    assert_eq!(error.retry_after(), Some(Duration::from_secs(12)));
}

#[test]
fn test_providerError_kind_shouldMapToRemedy() {
    assert_eq!(
        ProviderError::AuthenticationFailed("bad".to_string()).kind().remedy(),
        Remedy::OpenSettings
    );
    assert_eq!(ProviderError::Timeout { after_secs: 10 }.kind().remedy(), Remedy::Retry);
    assert_eq!(ProviderError::NotAvailable.kind().remedy(), Remedy::SwitchEngine);
    assert_eq!(ProviderError::EmptyInput.kind().remedy(), Remedy::None);
    assert_eq!(ProviderError::OperationInProgress.kind(), ErrorKind::Busy);
}

#[test]
fn test_providerError_httpStatus_shouldSplitServerAndClientErrors() {
    let server = ProviderError::HttpError {
        status_code: 503,
        message: "unavailable".to_string(),
    };
    let client = ProviderError::HttpError {
        status_code: 400,
        message: "bad request".to_string(),
    };
    assert!(server.is_retryable());
    assert!(!client.is_retryable());
    assert_eq!(client.kind(), ErrorKind::InvalidResponse);
}

#[test]
fn test_translationError_provider_shouldCarryEngine() {
    let error = TranslationError::provider(
        EngineType::DeepL.into(),
        ProviderError::NetworkError("reset".to_string()),
    );
    assert_eq!(error.engine(), Some(EngineIdentifier::Standard(EngineType::DeepL)));
    assert_eq!(error.to_string(), "deepl: Network error: reset");
    assert_eq!(error.kind(), ErrorKind::Network);
}

#[test]
fn test_translationError_allEnginesFailed_shouldListEveryFailure() {
    let error = TranslationError::AllEnginesFailed(vec![
        TranslationError::provider(EngineType::OpenAI.into(), ProviderError::Timeout { after_secs: 30 }),
        TranslationError::NotRegistered(EngineType::Baidu.into()),
    ]);
    let display = error.to_string();
    assert!(display.starts_with("All engines failed"));
    assert!(display.contains("openai: Request timed out after 30s"));
    assert!(display.contains("baidu"));
    assert_eq!(error.engine(), None);
    assert_eq!(error.underlying().len(), 2);
    assert_eq!(error.kind().remedy(), Remedy::SwitchEngine);
}

#[test]
fn test_appError_conversions_shouldWrapSources() {
    let from_provider: AppError = ProviderError::EmptyInput.into();
    assert!(matches!(from_provider, AppError::Provider(ProviderError::EmptyInput)));

    let from_anyhow: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(from_anyhow.to_string(), "Unknown error: boom");

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let from_io: AppError = io.into();
    assert!(from_io.to_string().contains("missing"));
}
