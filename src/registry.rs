/*!
 * Provider registry.
 *
 * Creates providers lazily from a settings snapshot plus the secret store,
 * caches them by engine, and drops the whole standard-engine cache when the
 * configuration fingerprint of the engine being looked up changes.
 *
 * OpenAI-compatible instances have their own slots keyed by index and are
 * only rebuilt on request. Host-registered providers are pinned and survive
 * invalidation.
 */

use futures::future::join_all;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{CompatibleEngineConfig, Config, SettingsSource};
use crate::engine::{EngineIdentifier, EngineProfile, EngineType};
use crate::errors::TranslationError;
use crate::providers::anthropic::Anthropic;
use crate::providers::apple::{AppleRecognizer, AppleTranslator};
use crate::providers::deepl::DeepL;
use crate::providers::gemini::Gemini;
use crate::providers::google::GoogleTranslate;
use crate::providers::mtran::MtranServer;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;
use crate::providers::paddle::PaddleOcr;
use crate::providers::{ProviderConfiguration, TranslationProvider, VisionProvider};
use crate::secrets::SecretStore;

/// The capabilities one engine offers
#[derive(Clone)]
pub struct EngineHandle {
    engine: EngineIdentifier,
    translation: Option<Arc<dyn TranslationProvider>>,
    vision: Option<Arc<dyn VisionProvider>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine)
            .field("translation", &self.translation.is_some())
            .field("vision", &self.vision.is_some())
            .finish()
    }
}

impl EngineHandle {
    pub fn new(engine: EngineIdentifier) -> Self {
        Self {
            engine,
            translation: None,
            vision: None,
        }
    }

    pub fn with_translation(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.translation = Some(provider);
        self
    }

    pub fn with_vision(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.vision = Some(provider);
        self
    }

    /// Register one instance for both capabilities
    pub fn with_both<P>(engine: EngineIdentifier, provider: Arc<P>) -> Self
    where
        P: TranslationProvider + VisionProvider + 'static,
    {
        Self::new(engine)
            .with_translation(provider.clone())
            .with_vision(provider)
    }

    pub fn engine(&self) -> EngineIdentifier {
        self.engine
    }

    pub fn translator(&self) -> Result<Arc<dyn TranslationProvider>, TranslationError> {
        self.translation
            .clone()
            .ok_or(TranslationError::NotRegistered(self.engine))
    }

    pub fn recognizer(&self) -> Result<Arc<dyn VisionProvider>, TranslationError> {
        self.vision.clone().ok_or(TranslationError::NotRegistered(self.engine))
    }

    /// Availability of whichever capability the engine has
    pub async fn is_available(&self) -> bool {
        if let Some(translation) = &self.translation {
            if translation.is_available().await {
                return true;
            }
        }
        match &self.vision {
            Some(vision) => vision.is_available().await,
            None => false,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Standard engines
    cache: HashMap<EngineType, EngineHandle>,
    /// Last configuration fingerprint seen per engine
    hashes: HashMap<EngineIdentifier, String>,
    compatible: HashMap<usize, EngineHandle>,
    pinned: HashMap<EngineIdentifier, EngineHandle>,
}

/// Creates, caches and looks up providers
pub struct ProviderRegistry {
    settings: Arc<dyn SettingsSource>,
    secrets: Arc<dyn SecretStore>,
    state: Mutex<RegistryState>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProviderRegistry")
            .field("cached", &state.cache.len())
            .field("compatible", &state.compatible.len())
            .field("pinned", &state.pinned.len())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(settings: Arc<dyn SettingsSource>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            settings,
            secrets,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Current settings snapshot
    pub fn settings(&self) -> Arc<Config> {
        self.settings.snapshot()
    }

    /// Pin a host-supplied provider (platform bridge, test double)
    pub fn register(&self, handle: EngineHandle) {
        debug!("Pinning provider for {}", handle.engine);
        self.state.lock().pinned.insert(handle.engine, handle);
    }

    pub fn unregister(&self, engine: EngineIdentifier) -> Option<EngineHandle> {
        self.state.lock().pinned.remove(&engine)
    }

    /// Drop every cached provider except pinned ones
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.hashes.clear();
        state.compatible.clear();
        info!("Provider cache cleared");
    }

    /// Look up (or create) the provider for an engine.
    ///
    /// `compatible_configs` supplies compatible-instance settings; an empty
    /// slice falls back to the current settings. `force_refresh` rebuilds the
    /// entry even when one is cached.
    pub fn get_provider(
        &self,
        engine: EngineIdentifier,
        compatible_configs: &[CompatibleEngineConfig],
        force_refresh: bool,
    ) -> Result<EngineHandle, TranslationError> {
        if let Some(pinned) = self.state.lock().pinned.get(&engine) {
            return Ok(pinned.clone());
        }

        match engine {
            EngineIdentifier::Standard(engine_type) => {
                let config = self.configuration_for(engine, compatible_configs)?;
                let hash = config.fingerprint();

                let mut state = self.state.lock();
                let changed = state.hashes.get(&engine).is_some_and(|previous| *previous != hash);
                if changed {
                    info!("Configuration of {} changed; clearing provider cache", engine);
                    state.cache.clear();
                }
                state.hashes.insert(engine, hash);

                if !force_refresh {
                    if let Some(handle) = state.cache.get(&engine_type) {
                        return Ok(handle.clone());
                    }
                }

                let handle = build_handle(config)?;
                debug!("Created provider for {}", engine);
                state.cache.insert(engine_type, handle.clone());
                Ok(handle)
            }
            EngineIdentifier::Compatible { index } => {
                if !force_refresh {
                    if let Some(handle) = self.state.lock().compatible.get(&index) {
                        return Ok(handle.clone());
                    }
                }

                let config = self.configuration_for(engine, compatible_configs)?;
                let handle = build_handle(config)?;
                debug!("Created provider for {}", engine);
                self.state.lock().compatible.insert(index, handle.clone());
                Ok(handle)
            }
        }
    }

    /// Connection data for an engine from the current settings and secrets
    pub fn configuration_for(
        &self,
        engine: EngineIdentifier,
        compatible_configs: &[CompatibleEngineConfig],
    ) -> Result<ProviderConfiguration, TranslationError> {
        let snapshot = self.settings.snapshot();
        let mut config = ProviderConfiguration::new(engine);

        match engine {
            EngineIdentifier::Standard(engine_type) => {
                let settings = snapshot.provider_config(engine_type);
                if !settings.model.trim().is_empty() {
                    config.model = settings.model.trim().to_string();
                }
                if !settings.endpoint.trim().is_empty() {
                    config.base_url = settings.endpoint.trim().to_string();
                }
                config.timeout = Duration::from_secs(settings.effective_timeout_secs());
                config.max_tokens = settings.max_tokens;
                config.temperature = settings.temperature;
                config.use_cloud = settings.use_cloud;
                config.paddle_mode = settings.paddle_mode;
                config.command = settings.command;
                config.ocr_language = settings.ocr_language;
            }
            EngineIdentifier::Compatible { index } => {
                let settings = compatible_configs
                    .get(index)
                    .or_else(|| snapshot.compatible_config(index))
                    .ok_or(TranslationError::NotRegistered(engine))?;
                config.base_url = settings.endpoint.trim().to_string();
                config.model = settings.model.trim().to_string();
                config.timeout = Duration::from_secs(settings.timeout_secs.max(1));
                config.max_tokens = settings.max_tokens;
                config.temperature = settings.temperature;
                config.supports_vision = settings.supports_vision;
            }
        }

        config.vision_max_tokens = snapshot.vision.max_tokens;
        config.jpeg_quality = snapshot.vision.jpeg_quality;
        config.max_continuation_attempts = snapshot.vision.max_continuation_attempts;

        match self.secrets.get_secret(&engine.secret_key()) {
            Ok(Some(secret)) => {
                config.api_key = secret.api_key;
                config.app_id = secret.app_id;
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read credentials for {}: {}", engine, e),
        }
        Ok(config)
    }

    /// Every engine this registry can serve with the current settings
    pub fn registered_engines(&self) -> Vec<EngineIdentifier> {
        let snapshot = self.settings.snapshot();
        let mut engines: Vec<EngineIdentifier> = EngineType::ALL
            .iter()
            .filter(|t| **t != EngineType::Baidu)
            .map(|t| EngineIdentifier::Standard(*t))
            .collect();
        engines.extend((0..snapshot.compatible_engines.len()).map(EngineIdentifier::compatible));
        for pinned in self.state.lock().pinned.keys() {
            if !engines.contains(pinned) {
                engines.push(*pinned);
            }
        }
        engines
    }

    /// Probe every registered engine concurrently; those that answered true
    pub async fn available_engines(&self) -> Vec<EngineIdentifier> {
        let handles: Vec<EngineHandle> = self
            .registered_engines()
            .into_iter()
            .filter_map(|engine| match self.get_provider(engine, &[], false) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    debug!("Skipping {}: {}", engine, e);
                    None
                }
            })
            .collect();

        let probes = handles.iter().map(|handle| async move {
            let available = handle.is_available().await;
            (handle.engine(), available)
        });
        join_all(probes)
            .await
            .into_iter()
            .filter_map(|(engine, available)| available.then_some(engine))
            .collect()
    }

    /// Key-requiring engines are checked against the secret store only;
    /// everything else asks the provider
    pub async fn is_engine_configured(&self, engine: EngineIdentifier) -> bool {
        let pinned = self.state.lock().pinned.contains_key(&engine);
        let requires_key = match engine {
            EngineIdentifier::Standard(engine_type) => EngineProfile::for_engine(engine_type).requires_api_key,
            EngineIdentifier::Compatible { .. } => false,
        };
        if requires_key && !pinned {
            return self.secrets.has_secret(&engine.secret_key());
        }

        match self.get_provider(engine, &[], false) {
            Ok(handle) => handle.is_available().await,
            Err(_) => false,
        }
    }
}

/// Construct the providers for one engine
fn build_handle(config: ProviderConfiguration) -> Result<EngineHandle, TranslationError> {
    let engine = config.engine;
    let handle = match engine.engine_type() {
        EngineType::Apple => EngineHandle::new(engine)
            .with_translation(Arc::new(AppleTranslator::unbridged()))
            .with_vision(Arc::new(AppleRecognizer::unbridged())),
        EngineType::MtranServer => EngineHandle::new(engine).with_translation(Arc::new(MtranServer::new(config))),
        EngineType::OpenAI | EngineType::Custom => {
            let supports_vision = config.supports_vision;
            let provider = Arc::new(OpenAI::new(config));
            let handle = EngineHandle::new(engine).with_translation(provider.clone());
            if supports_vision {
                handle.with_vision(provider)
            } else {
                handle
            }
        }
        EngineType::Claude => EngineHandle::with_both(engine, Arc::new(Anthropic::new(config))),
        EngineType::Gemini => EngineHandle::with_both(engine, Arc::new(Gemini::new(config))),
        EngineType::Ollama => EngineHandle::with_both(engine, Arc::new(Ollama::new(config))),
        EngineType::Google => EngineHandle::new(engine).with_translation(Arc::new(GoogleTranslate::new(config))),
        EngineType::DeepL => EngineHandle::new(engine).with_translation(Arc::new(DeepL::new(config))),
        EngineType::PaddleOcr => EngineHandle::new(engine).with_vision(Arc::new(PaddleOcr::new(config))),
        // Request signing is not implemented
        EngineType::Baidu => return Err(TranslationError::NotRegistered(engine)),
    };
    Ok(handle)
}
