/*!
 * Tests for engine selection, fallback and parallel runs
 */

use std::sync::Arc;
use std::time::Duration;

use screentrans::app_config::{Config, PromptOverride};
use screentrans::engine::{EngineIdentifier, EngineType, SelectionMode, TranslationScene};
use screentrans::errors::{ErrorKind, ProviderError, TranslationError};
use screentrans::models::{EngineResult, SceneEngineBinding, TextSegment};
use screentrans::providers::mock::MockProvider;
use screentrans::registry::{EngineHandle, ProviderRegistry};
use screentrans::translation::{OrchestrationRequest, OrchestrationService, PromptKind};

use crate::common::mock_providers::RecordingTranslator;
use crate::common::{test_image, test_registry};

fn pin(registry: &ProviderRegistry, mock: MockProvider, engine: EngineType) {
    registry.register(EngineHandle::with_both(engine.into(), Arc::new(mock)));
}

fn id(engine: EngineType) -> EngineIdentifier {
    EngineIdentifier::Standard(engine)
}

fn service_with(config: Config) -> (Arc<ProviderRegistry>, OrchestrationService) {
    let (_, _, registry) = test_registry(config);
    let service = OrchestrationService::new(registry.clone());
    (registry, service)
}

#[tokio::test]
async fn test_translate_primarySucceeds_shouldNotCallFallback() {
    let (registry, service) = service_with(Config::default());
    let primary = MockProvider::working(EngineType::OpenAI);
    let fallback = MockProvider::working(EngineType::DeepL);
    pin(&registry, primary.clone(), EngineType::OpenAI);
    pin(&registry, fallback.clone(), EngineType::DeepL);

    let request = OrchestrationRequest::from_texts(["Hello"])
        .target("fr")
        .primary(id(EngineType::OpenAI))
        .fallback(id(EngineType::DeepL));
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.primary_engine, id(EngineType::OpenAI));
    assert_eq!(bundle.fallback_from, None);
    assert_eq!(bundle.results.len(), 1);
    assert_eq!(bundle.primary_segments().unwrap()[0].translated_text(), "[fr] Hello");
    assert_eq!(fallback.request_count(), 0);
}

#[tokio::test]
async fn test_translate_primaryFails_shouldUseFallback() {
    let (registry, service) = service_with(Config::default());
    pin(
        &registry,
        MockProvider::failing(EngineType::OpenAI, ProviderError::NetworkError("offline".to_string())),
        EngineType::OpenAI,
    );
    pin(&registry, MockProvider::working(EngineType::Apple), EngineType::Apple);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("de")
        .primary(id(EngineType::OpenAI))
        .fallback(id(EngineType::Apple));
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.primary_engine, id(EngineType::Apple));
    assert_eq!(bundle.fallback_from, Some(id(EngineType::OpenAI)));
    assert_eq!(bundle.selection_mode, SelectionMode::PrimaryWithFallback);
    let segments = bundle.primary_segments().unwrap();
    assert_eq!(segments[0].original.text, "A");
    assert_eq!(segments[0].translated_text(), "[de] A");
}

#[tokio::test]
async fn test_translate_bothFail_shouldReportBothErrors() {
    let (registry, service) = service_with(Config::default());
    pin(
        &registry,
        MockProvider::failing(EngineType::OpenAI, ProviderError::Timeout { after_secs: 30 }),
        EngineType::OpenAI,
    );
    pin(
        &registry,
        MockProvider::failing(EngineType::DeepL, ProviderError::AuthenticationFailed("bad key".to_string())),
        EngineType::DeepL,
    );

    let request = OrchestrationRequest::from_texts(["A"])
        .target("de")
        .primary(id(EngineType::OpenAI))
        .fallback(id(EngineType::DeepL));
    let error = service.translate(request).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AllEnginesFailed);
    let underlying = error.underlying();
    assert_eq!(underlying.len(), 2);
    assert_eq!(underlying[0].engine(), Some(id(EngineType::OpenAI)));
    assert_eq!(underlying[0].kind(), ErrorKind::Timeout);
    assert_eq!(underlying[1].kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_translate_noFallback_shouldPropagatePrimaryError() {
    let (registry, service) = service_with(Config::default());
    pin(
        &registry,
        MockProvider::failing(EngineType::Gemini, ProviderError::ModelUnavailable("gone".to_string())),
        EngineType::Gemini,
    );
    let fallback = MockProvider::working(EngineType::Apple);
    pin(&registry, fallback.clone(), EngineType::Apple);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("en")
        .primary(id(EngineType::Gemini))
        .fallback(id(EngineType::Apple))
        .without_fallback();
    let error = service.translate(request).await.unwrap_err();

    assert!(matches!(
        error,
        TranslationError::Provider {
            source: ProviderError::ModelUnavailable(_),
            ..
        }
    ));
    assert_eq!(fallback.request_count(), 0);
}

#[tokio::test]
async fn test_translate_unavailablePrimary_shouldFallBack() {
    let (registry, service) = service_with(Config::default());
    let primary = MockProvider::unavailable(EngineType::MtranServer);
    pin(&registry, primary.clone(), EngineType::MtranServer);
    pin(&registry, MockProvider::working(EngineType::Google), EngineType::Google);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("ja")
        .primary(id(EngineType::MtranServer))
        .fallback(id(EngineType::Google));
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.primary_engine, id(EngineType::Google));
    assert_eq!(primary.request_count(), 0);
}

#[tokio::test]
async fn test_translate_quickSwitch_shouldNeverFallBack() {
    let mut config = Config::default();
    config.selection_mode = SelectionMode::QuickSwitch;
    config.preferred_engine = id(EngineType::DeepL);
    config.fallback_engine = Some(id(EngineType::Apple));
    config.fallback_enabled = true;
    let (registry, service) = service_with(config);
    pin(
        &registry,
        MockProvider::failing(EngineType::DeepL, ProviderError::RateLimited {
            retry_after_secs: None,
            message: None,
        }),
        EngineType::DeepL,
    );
    let fallback = MockProvider::working(EngineType::Apple);
    pin(&registry, fallback.clone(), EngineType::Apple);

    let error = service
        .translate(OrchestrationRequest::from_texts(["A"]).target("en"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::RateLimited);
    assert_eq!(fallback.request_count(), 0);
}

#[tokio::test]
async fn test_translate_parallel_shouldKeepEveryOutcome() {
    let (registry, service) = service_with(Config::default());
    pin(&registry, MockProvider::working(EngineType::OpenAI), EngineType::OpenAI);
    pin(
        &registry,
        MockProvider::failing(EngineType::Claude, ProviderError::RateLimited {
            retry_after_secs: Some(30),
            message: None,
        }),
        EngineType::Claude,
    );
    pin(
        &registry,
        MockProvider::failing(EngineType::Gemini, ProviderError::AuthenticationFailed("nope".to_string())),
        EngineType::Gemini,
    );

    let request = OrchestrationRequest::from_texts(["Hello", "World"])
        .target("fr")
        .mode(SelectionMode::Parallel)
        .parallel(vec![id(EngineType::OpenAI), id(EngineType::Claude), id(EngineType::Gemini)]);
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.results.len(), 3);
    assert_eq!(bundle.primary_engine, id(EngineType::OpenAI));
    assert_eq!(bundle.successful_results().count(), 1);

    let claude = bundle.result_for(id(EngineType::Claude)).unwrap();
    let retry = claude.error().and_then(|e| e.provider_error()).and_then(|e| e.retry_after());
    assert_eq!(retry, Some(Duration::from_secs(30)));
    assert_eq!(
        bundle.result_for(id(EngineType::Gemini)).unwrap().error().unwrap().kind(),
        ErrorKind::Authentication
    );
    assert_eq!(bundle.result_for(id(EngineType::OpenAI)).unwrap().segments().unwrap().len(), 2);
}

#[tokio::test]
async fn test_translate_parallel_shouldOrderByCompletion() {
    let (registry, service) = service_with(Config::default());
    pin(&registry, MockProvider::slow(EngineType::Ollama, 200), EngineType::Ollama);
    pin(&registry, MockProvider::working(EngineType::Google), EngineType::Google);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("fr")
        .mode(SelectionMode::Parallel)
        .parallel(vec![id(EngineType::Ollama), id(EngineType::Google), id(EngineType::Ollama)]);
    let bundle = service.translate(request).await.unwrap();

    let engines: Vec<EngineIdentifier> = bundle.results.iter().map(EngineResult::engine).collect();
    assert_eq!(engines, vec![id(EngineType::Google), id(EngineType::Ollama)]);
    assert_eq!(bundle.primary_engine, id(EngineType::Ollama));
}

#[tokio::test]
async fn test_translate_parallelAllFail_shouldStillReturnBundle() {
    let (registry, service) = service_with(Config::default());
    pin(&registry, MockProvider::unavailable(EngineType::OpenAI), EngineType::OpenAI);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("fr")
        .mode(SelectionMode::Parallel)
        .parallel(vec![id(EngineType::OpenAI), id(EngineType::Baidu)]);
    let bundle = service.translate(request).await.unwrap();

    assert!(bundle.all_failed());
    let baidu = bundle.result_for(id(EngineType::Baidu)).unwrap();
    assert_eq!(baidu.error().unwrap().kind(), ErrorKind::NotRegistered);
}

#[tokio::test]
async fn test_translate_sceneBinding_shouldUseSceneEngines() {
    let mut config = Config::default();
    config.selection_mode = SelectionMode::SceneBinding;
    config.scene_bindings.push(
        SceneEngineBinding::new(TranslationScene::TextSelection, id(EngineType::Claude))
            .with_fallback(id(EngineType::DeepL)),
    );
    let (registry, service) = service_with(config);
    pin(
        &registry,
        MockProvider::failing(EngineType::Claude, ProviderError::NetworkError("down".to_string())),
        EngineType::Claude,
    );
    pin(&registry, MockProvider::working(EngineType::DeepL), EngineType::DeepL);

    let request = OrchestrationRequest::from_texts(["A"])
        .target("es")
        .scene(TranslationScene::TextSelection);
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.scene, Some(TranslationScene::TextSelection));
    assert_eq!(bundle.selection_mode, SelectionMode::SceneBinding);
    assert_eq!(bundle.primary_engine, id(EngineType::DeepL));
    assert_eq!(bundle.fallback_from, Some(id(EngineType::Claude)));
}

#[tokio::test]
async fn test_translate_emptySegments_shouldSucceedWithoutCalls() {
    let (registry, service) = service_with(Config::default());
    let mock = MockProvider::working(EngineType::OpenAI);
    pin(&registry, mock.clone(), EngineType::OpenAI);

    let request = OrchestrationRequest::from_segments(Vec::new())
        .target("fr")
        .primary(id(EngineType::OpenAI));
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.primary_segments().unwrap().len(), 0);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_translate_outOfOrderBatch_shouldRealignSegments() {
    let (registry, service) = service_with(Config::default());
    let translator = RecordingTranslator::new(EngineType::Google).reversed();
    registry.register(EngineHandle::new(id(EngineType::Google)).with_translation(Arc::new(translator)));

    let request = OrchestrationRequest::from_texts(["one", "two", "three"])
        .target("fr")
        .primary(id(EngineType::Google));
    let bundle = service.translate(request).await.unwrap();

    let pairs: Vec<(&str, &str)> = bundle
        .primary_segments()
        .unwrap()
        .iter()
        .map(|s| (s.original.text.as_str(), s.translated_text()))
        .collect();
    assert_eq!(pairs, vec![("one", "ONE"), ("two", "TWO"), ("three", "THREE")]);
}

#[tokio::test]
async fn test_translate_promptOverride_shouldReachProvider() {
    let mut config = Config::default();
    config.prompt_overrides.push(PromptOverride {
        engine: id(EngineType::OpenAI),
        scene: None,
        kind: PromptKind::Translation,
        template: "Translate into {target_language} like a pirate.".to_string(),
    });
    let (registry, service) = service_with(config);
    let translator = RecordingTranslator::new(EngineType::OpenAI);
    let tracker = translator.tracker();
    registry.register(EngineHandle::new(id(EngineType::OpenAI)).with_translation(Arc::new(translator)));

    let request = OrchestrationRequest::from_texts(["Hello"])
        .source("auto")
        .target("fr")
        .primary(id(EngineType::OpenAI));
    service.translate(request).await.unwrap();

    let tracker = tracker.lock();
    assert_eq!(tracker.batches, vec![vec!["Hello".to_string()]]);
    assert_eq!(
        tracker.system_prompts[0].as_deref(),
        Some("Translate into French like a pirate.")
    );
    assert_eq!(tracker.source_languages[0], None);
}

#[tokio::test]
async fn test_analyze_shouldReturnSegmentsFromVisionEngine() {
    let mut config = Config::default();
    config.vision.engine = id(EngineType::Claude);
    let (registry, service) = service_with(config);
    let segments = vec![TextSegment::from_text("Bonjour"), TextSegment::from_text("Salut")];
    pin(
        &registry,
        MockProvider::working(EngineType::Claude).with_segments(segments),
        EngineType::Claude,
    );

    let outcome = service
        .analyze(&test_image(64, 32), TranslationScene::Screenshot)
        .await
        .unwrap();

    assert_eq!(outcome.engine, id(EngineType::Claude));
    assert_eq!(outcome.analysis.segments.len(), 2);
    assert_eq!(outcome.analysis.image_size.width, 64);
    assert_eq!(outcome.fallback_from, None);
}

#[tokio::test]
async fn test_analyze_primaryFails_shouldUseVisionFallback() {
    let mut config = Config::default();
    config.vision.engine = id(EngineType::OpenAI);
    config.vision.fallback_engine = Some(id(EngineType::PaddleOcr));
    let (registry, service) = service_with(config);
    pin(
        &registry,
        MockProvider::failing(EngineType::OpenAI, ProviderError::ParsingFailed("garbage".to_string())),
        EngineType::OpenAI,
    );
    pin(&registry, MockProvider::working(EngineType::PaddleOcr), EngineType::PaddleOcr);

    let outcome = service
        .analyze(&test_image(10, 10), TranslationScene::Screenshot)
        .await
        .unwrap();

    assert_eq!(outcome.engine, id(EngineType::PaddleOcr));
    assert_eq!(outcome.fallback_from, Some(id(EngineType::OpenAI)));
}

#[tokio::test]
async fn test_analyzeAndTranslate_shouldPairExtractedText() {
    let mut config = Config::default();
    config.vision.engine = id(EngineType::Gemini);
    config.preferred_engine = id(EngineType::DeepL);
    let (registry, service) = service_with(config);
    pin(
        &registry,
        MockProvider::working(EngineType::Gemini).with_segments(vec![TextSegment::from_text("Guten Tag")]),
        EngineType::Gemini,
    );
    pin(&registry, MockProvider::working(EngineType::DeepL), EngineType::DeepL);

    let bundle = service
        .analyze_and_translate(&test_image(8, 8), OrchestrationRequest::default().target("en"))
        .await
        .unwrap();

    assert_eq!(bundle.scene, Some(TranslationScene::Screenshot));
    assert_eq!(bundle.primary_engine, id(EngineType::DeepL));
    assert_eq!(bundle.primary_segments().unwrap()[0].translated_text(), "[en] Guten Tag");
}
