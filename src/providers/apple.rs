/*!
 * Bridge to the host platform's on-device translation and text recognition.
 *
 * The platform frameworks are outside this crate. A host supplies them through
 * [`PlatformTranslator`] and [`PlatformTextRecognizer`] and pins the resulting
 * providers in the registry. Without a bridge the Apple engine reports itself
 * unavailable.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use super::{TranslationProvider, TranslationRequest, VisionProvider};
use crate::engine::{EngineIdentifier, EngineType};
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{ScreenAnalysisResult, TextSegment, TranslationResult};
use crate::parsing::segments::normalize_box;

/// Host-supplied text translation
#[async_trait]
pub trait PlatformTranslator: Send + Sync + Debug {
    async fn is_available(&self) -> bool {
        true
    }

    /// Translate one text; `None` source means detect
    async fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, ProviderError>;
}

/// Host-supplied OCR; boxes may be in pixels or normalized
#[async_trait]
pub trait PlatformTextRecognizer: Send + Sync + Debug {
    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, image: &ImageData) -> Result<Vec<TextSegment>, ProviderError>;
}

/// Apple translation engine
#[derive(Debug, Clone, Default)]
pub struct AppleTranslator {
    bridge: Option<Arc<dyn PlatformTranslator>>,
}

impl AppleTranslator {
    pub fn new(bridge: Arc<dyn PlatformTranslator>) -> Self {
        Self { bridge: Some(bridge) }
    }

    /// Engine with no host bridge; always unavailable
    pub fn unbridged() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranslationProvider for AppleTranslator {
    fn engine(&self) -> EngineIdentifier {
        EngineIdentifier::Standard(EngineType::Apple)
    }

    async fn is_available(&self) -> bool {
        match &self.bridge {
            Some(bridge) => bridge.is_available().await,
            None => false,
        }
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        let bridge = self.bridge.as_ref().ok_or(ProviderError::NotAvailable)?;
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }
        let translated = bridge
            .translate(&request.text, request.source_language.as_deref(), &request.target_language)
            .await?;
        Ok(request.result(translated))
    }
}

/// Apple text recognition engine
#[derive(Debug, Clone, Default)]
pub struct AppleRecognizer {
    bridge: Option<Arc<dyn PlatformTextRecognizer>>,
}

impl AppleRecognizer {
    pub fn new(bridge: Arc<dyn PlatformTextRecognizer>) -> Self {
        Self { bridge: Some(bridge) }
    }

    pub fn unbridged() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisionProvider for AppleRecognizer {
    fn engine(&self) -> EngineIdentifier {
        EngineIdentifier::Standard(EngineType::Apple)
    }

    async fn is_available(&self) -> bool {
        match &self.bridge {
            Some(bridge) => bridge.is_available().await,
            None => false,
        }
    }

    /// Platform OCR takes no prompt
    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        _system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let bridge = self.bridge.as_ref().ok_or(ProviderError::NotAvailable)?;
        let size = image.size();
        let segments = bridge
            .recognize(image)
            .await?
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|mut segment| {
                segment.bounding_box = normalize_box(segment.bounding_box, size);
                segment
            })
            .collect();
        Ok(ScreenAnalysisResult::new(segments, size))
    }
}
