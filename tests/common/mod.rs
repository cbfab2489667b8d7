/*!
 * Common test utilities for the screentrans test suite
 */

use std::sync::Arc;

use screentrans::app_config::{Config, SharedSettings};
use screentrans::engine::EngineType;
use screentrans::image_utils::ImageData;
use screentrans::providers::ProviderConfiguration;
use screentrans::registry::ProviderRegistry;
use screentrans::secrets::InMemorySecretStore;


/// Registry over in-memory settings and secrets, returned with both so a
/// test can edit them afterwards
pub fn test_registry(config: Config) -> (Arc<SharedSettings>, Arc<InMemorySecretStore>, Arc<ProviderRegistry>) {
    let settings = Arc::new(SharedSettings::new(config));
    let secrets = Arc::new(InMemorySecretStore::new());
    let registry = Arc::new(ProviderRegistry::new(settings.clone(), secrets.clone()));
    (settings, secrets, registry)
}

/// Connection data pointing an engine at a local mock server
pub fn config_for_server(engine: EngineType, server_uri: &str) -> ProviderConfiguration {
    ProviderConfiguration::new(engine.into())
        .api_key("test-key")
        .base_url(server_uri)
}

/// Small solid-color capture
pub fn test_image(width: u32, height: u32) -> ImageData {
    let pixels = vec![255u8; (width * height * 4) as usize];
    ImageData::from_rgba(width, height, pixels).expect("valid pixel buffer")
}

/// Install `env_logger` for debugging a single test; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
