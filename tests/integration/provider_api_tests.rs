/*!
 * Integration tests against live provider APIs.
 *
 * Ignored by default. Run with `cargo test -- --ignored` after exporting the
 * matching `SCREENTRANS_*_API_KEY` variables; a test without its key passes
 * without calling anything.
 */

use std::env;

use screentrans::engine::{EngineType, SelectionMode, TranslationScene};
use screentrans::providers::anthropic::Anthropic;
use screentrans::providers::deepl::DeepL;
use screentrans::providers::ollama::Ollama;
use screentrans::providers::openai::OpenAI;
use screentrans::providers::{ProviderConfiguration, TranslationProvider, TranslationRequest};
use screentrans::secrets::{Secret, SecretStore};
use screentrans::{Config, OrchestrationRequest, OrchestrationService};

use crate::common;

fn live_key(engine: &str) -> Option<String> {
    let name = format!("SCREENTRANS_{}_API_KEY", engine.to_uppercase());
    match env::var(&name) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            eprintln!("{} not set; skipping", name);
            None
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_openai_live_shouldTranslate() {
    common::init_logging();
    let Some(key) = live_key("openai") else { return };

    let provider = OpenAI::new(ProviderConfiguration::new(EngineType::OpenAI.into()).api_key(key));
    let result = provider
        .translate(TranslationRequest::new("Good morning", "fr").source("en"))
        .await
        .unwrap();
    assert!(!result.translated_text.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_anthropic_live_shouldTranslate() {
    common::init_logging();
    let Some(key) = live_key("claude") else { return };

    let provider = Anthropic::new(ProviderConfiguration::new(EngineType::Claude.into()).api_key(key));
    let result = provider.translate(TranslationRequest::new("Good morning", "de")).await.unwrap();
    assert!(!result.translated_text.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_deepl_live_shouldDetectSource() {
    common::init_logging();
    let Some(key) = live_key("deepl") else { return };

    let provider = DeepL::new(ProviderConfiguration::new(EngineType::DeepL.into()).api_key(key));
    let result = provider.translate(TranslationRequest::new("Good morning", "ja")).await.unwrap();
    assert_eq!(result.source_language.as_deref(), Some("en"));
}

#[tokio::test]
#[ignore]
async fn test_ollama_live_shouldReportVersion() {
    common::init_logging();
    let provider = Ollama::new(ProviderConfiguration::new(EngineType::Ollama.into()));
    if !TranslationProvider::is_available(&provider).await {
        eprintln!("Ollama not running; skipping");
        return;
    }
    assert!(!provider.version().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_orchestrator_live_shouldFallBackToDeepL() {
    common::init_logging();
    let Some(deepl_key) = live_key("deepl") else { return };

    let mut config = Config::default();
    config.preferred_engine = EngineType::Claude.into();
    config.fallback_engine = Some(EngineType::DeepL.into());
    config.fallback_enabled = true;
    let (_settings, secrets, registry) = common::test_registry(config);
    secrets.set_secret("claude", &Secret::api_key("invalid-key")).unwrap();
    secrets.set_secret("deepl", &Secret::api_key(deepl_key)).unwrap();

    let service = OrchestrationService::new(registry);
    let request = OrchestrationRequest::from_texts(["Save", "Cancel"])
        .target("es")
        .mode(SelectionMode::PrimaryWithFallback)
        .scene(TranslationScene::TextSelection);
    let bundle = service.translate(request).await.unwrap();

    assert_eq!(bundle.fallback_from, Some(EngineType::Claude.into()));
    assert!(bundle.results[0].is_success());
}
