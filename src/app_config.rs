use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{EngineIdentifier, EngineProfile, EngineType, SelectionMode, TranslationScene};
use crate::models::SceneEngineBinding;
use crate::translation::prompts::PromptKind;

/// Application configuration module
/// This module handles the settings snapshot the core reads at call time:
/// engine routing, per-engine connection data, scene bindings and prompt
/// overrides. Secrets are never stored here; see `secrets`.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Source language code, or "auto"
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Engine used for text translation
    #[serde(default = "default_preferred_engine")]
    pub preferred_engine: EngineIdentifier,

    /// Engine tried when the preferred one fails
    #[serde(default)]
    pub fallback_engine: Option<EngineIdentifier>,

    #[serde(default)]
    pub fallback_enabled: bool,

    #[serde(default)]
    pub selection_mode: SelectionMode,

    /// Engines raced in parallel mode
    #[serde(default)]
    pub parallel_engines: Vec<EngineIdentifier>,

    /// Per-engine connection settings
    #[serde(default = "default_engines")]
    pub engines: Vec<ProviderConfig>,

    /// User-defined OpenAI-compatible endpoints, addressed by index
    #[serde(default)]
    pub compatible_engines: Vec<CompatibleEngineConfig>,

    #[serde(default)]
    pub scene_bindings: Vec<SceneEngineBinding>,

    #[serde(default)]
    pub prompt_overrides: Vec<PromptOverride>,

    #[serde(default)]
    pub vision: VisionConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// PaddleOCR execution mode
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PaddleMode {
    // @mode: Spawn the `paddleocr` command line per capture
    #[default]
    Cli,
    // @mode: POST to a local PaddleX serving endpoint
    LocalServer,
    // @mode: POST to a hosted endpoint with a token
    Cloud,
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    // @field: Engine type identifier
    #[serde(rename = "type")]
    pub engine: EngineType,

    // @field: Model name (empty = engine default)
    #[serde(default)]
    pub model: String,

    // @field: Service URL (empty = engine default)
    #[serde(default)]
    pub endpoint: String,

    // @field: Timeout seconds (None = engine default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    // @field: Output token limit for model engines
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // @field: Sampling temperature for model engines
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Cloud/local toggle for engines offering both
    #[serde(default)]
    pub use_cloud: bool,

    // @field: PaddleOCR execution mode
    #[serde(default)]
    pub paddle_mode: PaddleMode,

    // @field: Executable for CLI-backed engines
    #[serde(default)]
    pub command: Option<String>,

    // @field: OCR language hint passed to PaddleOCR
    #[serde(default)]
    pub ocr_language: Option<String>,
}

impl ProviderConfig {
    // @param engine: Engine type
    // @returns: Provider config with defaults
    pub fn new(engine: EngineType) -> Self {
        let profile = EngineProfile::for_engine(engine);
        Self {
            engine,
            model: profile.default_model.to_string(),
            endpoint: profile.default_endpoint.to_string(),
            timeout_secs: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            use_cloud: false,
            paddle_mode: PaddleMode::default(),
            command: None,
            ocr_language: None,
        }
    }

    // @returns: Timeout in seconds, falling back to the engine default
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs
            .filter(|t| *t > 0)
            .unwrap_or_else(|| EngineProfile::for_engine(self.engine).default_timeout_secs)
    }
}

/// An OpenAI-compatible endpoint configured by the user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompatibleEngineConfig {
    /// Display name
    pub name: String,

    /// Base URL including the API prefix (e.g. `http://localhost:1234/v1`)
    pub endpoint: String,

    pub model: String,

    #[serde(default = "default_compatible_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Whether the model accepts images
    #[serde(default)]
    pub supports_vision: bool,
}

impl CompatibleEngineConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            timeout_secs: default_compatible_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            supports_vision: false,
        }
    }
}

/// A user replacement for a built-in system prompt
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptOverride {
    pub engine: EngineIdentifier,

    /// Scene the override applies to; `None` applies to every scene
    #[serde(default)]
    pub scene: Option<TranslationScene>,

    #[serde(default)]
    pub kind: PromptKind,

    /// Template text; supports `{source_language}` and `{target_language}`
    pub template: String,
}

/// Screen analysis settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    /// Engine used to extract text from captures
    #[serde(default = "default_vision_engine")]
    pub engine: EngineIdentifier,

    #[serde(default)]
    pub fallback_engine: Option<EngineIdentifier>,

    /// Output token limit for vision models
    #[serde(default = "default_vision_max_tokens")]
    pub max_tokens: u32,

    /// JPEG quality for uploads (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Upper bound on continuation turns after a truncated response
    #[serde(default = "default_max_continuation_attempts")]
    pub max_continuation_attempts: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            engine: default_vision_engine(),
            fallback_engine: None,
            max_tokens: default_vision_max_tokens(),
            jpeg_quality: default_jpeg_quality(),
            max_continuation_attempts: default_max_continuation_attempts(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_preferred_engine() -> EngineIdentifier {
    EngineIdentifier::Standard(EngineType::Apple)
}

fn default_vision_engine() -> EngineIdentifier {
    EngineIdentifier::Standard(EngineType::Apple)
}

fn default_engines() -> Vec<ProviderConfig> {
    EngineType::ALL.iter().copied().map(ProviderConfig::new).collect()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_vision_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_compatible_timeout_secs() -> u64 {
    60
}

fn default_jpeg_quality() -> u8 {
    crate::image_utils::DEFAULT_JPEG_QUALITY
}

fn default_max_continuation_attempts() -> u32 {
    3
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.source_language)
            .context("Invalid source language")?;
        if crate::language_utils::is_auto(&self.target_language) {
            return Err(anyhow!("Target language cannot be auto-detected"));
        }
        crate::language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;

        for provider in &self.engines {
            if !provider.endpoint.is_empty() {
                url::Url::parse(&provider.endpoint)
                    .with_context(|| format!("Invalid endpoint for {}: {}", provider.engine, provider.endpoint))?;
            }
        }

        for (index, compatible) in self.compatible_engines.iter().enumerate() {
            url::Url::parse(&compatible.endpoint)
                .with_context(|| format!("Invalid endpoint for compatible engine {} ({})", index, compatible.name))?;
            if compatible.model.trim().is_empty() {
                return Err(anyhow!("Compatible engine {} ({}) has no model", index, compatible.name));
            }
        }

        let mut referenced: Vec<EngineIdentifier> = vec![self.preferred_engine, self.vision.engine];
        referenced.extend(self.fallback_engine);
        referenced.extend(self.vision.fallback_engine);
        referenced.extend(self.parallel_engines.iter().copied());
        for binding in &self.scene_bindings {
            referenced.push(binding.primary_engine);
            referenced.extend(binding.fallback_engine);
        }
        for id in referenced {
            if let EngineIdentifier::Compatible { index } = id {
                if index >= self.compatible_engines.len() {
                    return Err(anyhow!("Engine {} refers to a compatible engine that is not configured", id));
                }
            }
        }

        if self.selection_mode == SelectionMode::Parallel && self.parallel_engines.is_empty() {
            return Err(anyhow!("Parallel mode needs at least one engine in parallelEngines"));
        }
        if self.fallback_enabled && self.fallback_engine.is_none() {
            return Err(anyhow!("Fallback is enabled but no fallback engine is set"));
        }
        if !(1..=100).contains(&self.vision.jpeg_quality) {
            return Err(anyhow!("JPEG quality must be between 1 and 100"));
        }

        Ok(())
    }

    /// Settings for one engine type, defaults when not configured
    pub fn provider_config(&self, engine: EngineType) -> ProviderConfig {
        self.engines
            .iter()
            .find(|p| p.engine == engine)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(engine))
    }

    pub fn compatible_config(&self, index: usize) -> Option<&CompatibleEngineConfig> {
        self.compatible_engines.get(index)
    }

    /// Configured binding for a scene, if any
    pub fn scene_binding(&self, scene: TranslationScene) -> Option<&SceneEngineBinding> {
        self.scene_bindings.iter().find(|b| b.scene == scene)
    }

    /// Override template for (engine, scene, kind); scene-specific entries win
    pub fn prompt_override(
        &self,
        engine: EngineIdentifier,
        scene: Option<TranslationScene>,
        kind: PromptKind,
    ) -> Option<&str> {
        let matching = |p: &&PromptOverride| p.engine == engine && p.kind == kind;
        self.prompt_overrides
            .iter()
            .filter(matching)
            .find(|p| scene.is_some() && p.scene == scene)
            .or_else(|| self.prompt_overrides.iter().filter(matching).find(|p| p.scene.is_none()))
            .map(|p| p.template.as_str())
    }

    /// Default location: `<config dir>/screentrans/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("screentrans").join("config.json"))
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Load configuration, or defaults when the file does not exist yet
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config file {:?}", path))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            preferred_engine: default_preferred_engine(),
            fallback_engine: None,
            fallback_enabled: false,
            selection_mode: SelectionMode::default(),
            parallel_engines: Vec::new(),
            engines: default_engines(),
            compatible_engines: Vec::new(),
            scene_bindings: Vec::new(),
            prompt_overrides: Vec::new(),
            vision: VisionConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

/// Read access to the current settings
pub trait SettingsSource: Send + Sync {
    /// Consistent snapshot of the configuration at call time
    fn snapshot(&self) -> Arc<Config>;
}

/// In-process settings store; writers swap the whole snapshot
#[derive(Debug, Default)]
pub struct SharedSettings {
    current: RwLock<Arc<Config>>,
}

impl SharedSettings {
    pub fn new(config: Config) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn replace(&self, config: Config) {
        *self.current.write() = Arc::new(config);
    }

    /// Apply an edit to a copy of the current settings and publish it
    pub fn update(&self, edit: impl FnOnce(&mut Config)) {
        let mut guard = self.current.write();
        let mut next = (**guard).clone();
        edit(&mut next);
        *guard = Arc::new(next);
    }
}

impl SettingsSource for SharedSettings {
    fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.current.read())
    }
}
