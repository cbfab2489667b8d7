/*!
 * Tests for provider caching and invalidation
 */

use std::sync::Arc;

use screentrans::app_config::{CompatibleEngineConfig, Config, ProviderConfig};
use screentrans::engine::{EngineIdentifier, EngineType};
use screentrans::errors::TranslationError;
use screentrans::providers::mock::MockProvider;
use screentrans::registry::EngineHandle;
use screentrans::secrets::{Secret, SecretStore};

use crate::common::test_registry;

fn same_translator(a: &EngineHandle, b: &EngineHandle) -> bool {
    Arc::ptr_eq(&a.translator().unwrap(), &b.translator().unwrap())
}

#[test]
fn test_getProvider_sameConfiguration_shouldReuseInstance() {
    let (_, secrets, registry) = test_registry(Config::default());
    secrets.set_secret("openai", &Secret::api_key("sk-1")).unwrap();

    let first = registry.get_provider(EngineType::OpenAI.into(), &[], false).unwrap();
    let second = registry.get_provider(EngineType::OpenAI.into(), &[], false).unwrap();
    assert!(same_translator(&first, &second));
}

#[test]
fn test_getProvider_changedKey_shouldRebuildInstance() {
    let (_, secrets, registry) = test_registry(Config::default());
    secrets.set_secret("openai", &Secret::api_key("sk-1")).unwrap();
    let first = registry.get_provider(EngineType::OpenAI.into(), &[], false).unwrap();

    secrets.set_secret("openai", &Secret::api_key("sk-2")).unwrap();
    let second = registry.get_provider(EngineType::OpenAI.into(), &[], false).unwrap();
    assert!(!same_translator(&first, &second));
}

#[test]
fn test_getProvider_changedModel_shouldClearWholeCache() {
    let (settings, _, registry) = test_registry(Config::default());
    let deepl_before = registry.get_provider(EngineType::DeepL.into(), &[], false).unwrap();
    registry.get_provider(EngineType::Ollama.into(), &[], false).unwrap();

    settings.update(|config| {
        let mut ollama = ProviderConfig::new(EngineType::Ollama);
        ollama.model = "llava:13b".to_string();
        config.engines.retain(|p| p.engine != EngineType::Ollama);
        config.engines.push(ollama);
    });
    registry.get_provider(EngineType::Ollama.into(), &[], false).unwrap();

    let deepl_after = registry.get_provider(EngineType::DeepL.into(), &[], false).unwrap();
    assert!(!same_translator(&deepl_before, &deepl_after));
}

#[test]
fn test_getProvider_forceRefresh_shouldRebuild() {
    let (_, _, registry) = test_registry(Config::default());
    let first = registry.get_provider(EngineType::Google.into(), &[], false).unwrap();
    let refreshed = registry.get_provider(EngineType::Google.into(), &[], true).unwrap();
    assert!(!same_translator(&first, &refreshed));
}

#[test]
fn test_getProvider_pinned_shouldWinOverSettings() {
    let (_, _, registry) = test_registry(Config::default());
    let mock = Arc::new(MockProvider::working(EngineType::Apple));
    registry.register(EngineHandle::with_both(EngineType::Apple.into(), mock));

    let handle = registry.get_provider(EngineType::Apple.into(), &[], true).unwrap();
    assert!(format!("{:?}", handle.translator().unwrap()).contains("MockProvider"));

    registry.unregister(EngineType::Apple.into());
    let handle = registry.get_provider(EngineType::Apple.into(), &[], false).unwrap();
    assert!(!format!("{:?}", handle.translator().unwrap()).contains("MockProvider"));
}

#[test]
fn test_getProvider_compatible_shouldUseSuppliedConfigs() {
    let (_, _, registry) = test_registry(Config::default());
    let configs = vec![
        CompatibleEngineConfig::new("LM Studio", "http://localhost:1234/v1", "qwen2.5-7b"),
        CompatibleEngineConfig::new("vLLM", "http://gpu-box:8000/v1", "llama-3.1-8b"),
    ];

    let handle = registry.get_provider(EngineIdentifier::compatible(1), &configs, false).unwrap();
    assert_eq!(handle.engine(), EngineIdentifier::compatible(1));
    assert!(handle.translator().is_ok());

    let missing = registry.get_provider(EngineIdentifier::compatible(5), &configs, false);
    assert!(matches!(missing, Err(TranslationError::NotRegistered(_))));
}

#[test]
fn test_configurationFor_compatible_shouldReadItsOwnSecret() {
    let mut config = Config::default();
    config
        .compatible_engines
        .push(CompatibleEngineConfig::new("Proxy", "https://proxy.example/v1", "gpt-4o"));
    let (_, secrets, registry) = test_registry(config);
    secrets.set_secret("compatible_0", &Secret::api_key("proxy-key")).unwrap();

    let configuration = registry.configuration_for(EngineIdentifier::compatible(0), &[]).unwrap();
    assert_eq!(configuration.api_key, "proxy-key");
    assert_eq!(configuration.base_url, "https://proxy.example/v1");
    assert_eq!(configuration.model, "gpt-4o");
}

#[test]
fn test_registeredEngines_shouldOmitBaiduAndListCompatibles() {
    let mut config = Config::default();
    config
        .compatible_engines
        .push(CompatibleEngineConfig::new("Local", "http://localhost:8000/v1", "m"));
    let (_, _, registry) = test_registry(config);

    let engines = registry.registered_engines();
    assert!(!engines.contains(&EngineType::Baidu.into()));
    assert!(engines.contains(&EngineType::PaddleOcr.into()));
    assert!(engines.contains(&EngineIdentifier::compatible(0)));
}

#[tokio::test]
async fn test_isEngineConfigured_keyEngine_shouldCheckSecretStore() {
    let (_, secrets, registry) = test_registry(Config::default());
    assert!(!registry.is_engine_configured(EngineType::Claude.into()).await);

    secrets.set_secret("claude", &Secret::api_key("sk-ant")).unwrap();
    assert!(registry.is_engine_configured(EngineType::Claude.into()).await);
}

#[tokio::test]
async fn test_availableEngines_shouldIncludeOnlyAvailablePins() {
    let (_, _, registry) = test_registry(Config::default());
    registry.register(EngineHandle::with_both(
        EngineType::Apple.into(),
        Arc::new(MockProvider::working(EngineType::Apple)),
    ));
    registry.register(EngineHandle::with_both(
        EngineType::PaddleOcr.into(),
        Arc::new(MockProvider::unavailable(EngineType::PaddleOcr)),
    ));

    let available = registry.available_engines().await;
    assert!(available.contains(&EngineType::Apple.into()));
    assert!(!available.contains(&EngineType::PaddleOcr.into()));
}

#[test]
fn test_isEngineConfigured_unbridgedApple_shouldBeFalse() {
    let (_, _, registry) = test_registry(Config::default());
    let configured = tokio_test::block_on(registry.is_engine_configured(EngineType::Apple.into()));
    assert!(!configured);
}
