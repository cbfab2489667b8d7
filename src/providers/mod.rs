/*!
 * Provider implementations for translation and screen text extraction.
 *
 * This module contains client implementations for each backend:
 * - Apple: host-supplied platform translation / text recognition
 * - MTranServer: self-hosted machine translation server
 * - OpenAI: Chat Completions, also used for custom OpenAI-compatible endpoints
 * - Anthropic: Claude Messages API
 * - Gemini: Google Gemini `generateContent`
 * - Ollama: local model server
 * - Google / DeepL: batch translation APIs
 * - PaddleOCR: command line, local serving or cloud OCR
 * - Mock: scriptable provider for tests
 */

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug};
use std::time::Duration;

use crate::app_config::PaddleMode;
use crate::engine::{EngineIdentifier, EngineProfile};
use crate::errors::ProviderError;
use crate::image_utils::{DEFAULT_JPEG_QUALITY, ImageData};
use crate::models::{ScreenAnalysisResult, TranslationResult};
use crate::translation::prompts::PromptTemplate;

/// One translation call
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub text: String,
    /// Source language; `None` lets the engine detect it
    pub source_language: Option<String>,
    pub target_language: String,
    /// Rendered system prompt replacing the built-in one (model engines only)
    pub system_prompt: Option<String>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: None,
            target_language: target_language.into(),
            system_prompt: None,
        }
    }

    /// Set the source language; "auto" and empty values mean detection
    pub fn source(mut self, source_language: impl Into<String>) -> Self {
        let source = source_language.into();
        self.source_language = (!crate::language_utils::is_auto(&source)).then_some(source);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// System prompt to send: the override if present, else the rendered default
    pub fn resolved_system_prompt(&self) -> String {
        self.system_prompt.clone().unwrap_or_else(|| {
            PromptTemplate::translator().render(self.source_language.as_deref(), &self.target_language)
        })
    }

    /// Result for this request with the given translation
    pub fn result(&self, translated_text: impl Into<String>) -> TranslationResult {
        TranslationResult::new(
            self.text.clone(),
            translated_text,
            self.source_language.clone(),
            self.target_language.clone(),
        )
    }
}

/// Common trait for all translation backends
///
/// Implementations perform exactly one outbound call per `translate` and never
/// retry internally; retries and fallback belong to the orchestration layer.
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Engine this instance serves
    fn engine(&self) -> EngineIdentifier;

    /// Capability probe, evaluated per call
    async fn is_available(&self) -> bool;

    /// Translate one text
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError>;

    /// Translate several texts, preserving input order.
    ///
    /// The default issues one call per text in sequence; engines with a real
    /// batch endpoint override it. Blank inputs are passed through untranslated.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
        system_prompt: Option<&str>,
    ) -> Result<Vec<TranslationResult>, ProviderError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let mut request = TranslationRequest::new(text.clone(), target_language);
            if let Some(source) = source_language {
                request = request.source(source);
            }
            if let Some(prompt) = system_prompt {
                request = request.system_prompt(prompt);
            }
            if text.trim().is_empty() {
                results.push(request.result(text.clone()));
                continue;
            }
            results.push(self.translate(request).await?);
        }
        Ok(results)
    }
}

/// Common trait for screen text extraction backends
#[async_trait]
pub trait VisionProvider: Send + Sync + Debug {
    fn engine(&self) -> EngineIdentifier;

    async fn is_available(&self) -> bool;

    /// Extract text segments, optionally replacing the built-in system prompt
    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError>;

    async fn analyze(&self, image: &ImageData) -> Result<ScreenAnalysisResult, ProviderError> {
        self.analyze_with_prompt(image, None).await
    }
}

/// Connection data for one provider instance
///
/// Built by the registry from a settings snapshot and the secret store. The
/// key only lives as long as the provider built from it.
#[derive(Clone)]
pub struct ProviderConfiguration {
    pub engine: EngineIdentifier,
    /// API key; empty for local engines
    pub api_key: String,
    pub app_id: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub use_cloud: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Vision output budget; separate from `max_tokens` because OCR output is long
    pub vision_max_tokens: u32,
    pub jpeg_quality: u8,
    pub max_continuation_attempts: u32,
    pub supports_vision: bool,
    pub paddle_mode: PaddleMode,
    pub command: Option<String>,
    pub ocr_language: Option<String>,
}

impl Debug for ProviderConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfiguration")
            .field("engine", &self.engine)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "[REDACTED]" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("use_cloud", &self.use_cloud)
            .finish_non_exhaustive()
    }
}

impl ProviderConfiguration {
    /// Configuration with the engine's profile defaults
    pub fn new(engine: EngineIdentifier) -> Self {
        let profile = EngineProfile::for_engine(engine.engine_type());
        Self {
            engine,
            api_key: String::new(),
            app_id: None,
            base_url: profile.default_endpoint.to_string(),
            model: profile.default_model.to_string(),
            timeout: Duration::from_secs(profile.default_timeout_secs),
            use_cloud: false,
            max_tokens: 2048,
            temperature: 0.3,
            vision_max_tokens: 4096,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_continuation_attempts: 3,
            supports_vision: profile.supports_vision,
            paddle_mode: PaddleMode::default(),
            command: None,
            ocr_language: None,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Base URL without a trailing slash
    pub fn endpoint(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Fail fast when a key-requiring engine has no key
    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        if self.has_api_key() {
            Ok(self.api_key.trim())
        } else {
            Err(ProviderError::InvalidConfiguration(format!(
                "{} requires an API key",
                self.engine
            )))
        }
    }

    /// SHA-256 over the fields that decide whether a cached provider is stale
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.engine.engine_type().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.api_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.base_url.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.model.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Strip quoting and fences models sometimes wrap around a plain translation
pub(crate) fn clean_model_translation(text: &str) -> String {
    let stripped = crate::parsing::strip_code_fences(text);
    let trimmed = stripped.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

pub mod http;

pub mod anthropic;
pub mod apple;
pub mod deepl;
pub mod gemini;
pub mod google;
pub mod mock;
pub mod mtran;
pub mod ollama;
pub mod openai;
pub mod paddle;
