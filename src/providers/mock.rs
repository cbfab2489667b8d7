/*!
 * Mock provider implementations for testing.
 *
 * One scriptable engine that serves both translation and text extraction:
 * - `MockProvider::working(engine)` - Always succeeds
 * - `MockProvider::failing(engine, error)` - Always fails with the given error
 * - `MockProvider::intermittent(engine, n)` - Fails every Nth request
 * - `MockProvider::unavailable(engine)` - Reports itself unavailable
 *
 * Clones share the request counter, so a test can keep one handle and
 * register another.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{TranslationProvider, TranslationRequest, VisionProvider};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{ScreenAnalysisResult, TextSegment, TranslationResult};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always fails with this error
    Failing(ProviderError),
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Simulates slow response (for timeout and ordering tests)
    Slow { delay_ms: u64 },
    /// Answers with nothing
    Empty,
    /// `is_available()` is false and every call fails with `NotAvailable`
    Unavailable,
}

/// Mock provider for testing orchestration behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    engine: EngineIdentifier,
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Segments returned by `analyze`
    segments: Vec<TextSegment>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&TranslationRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(engine: EngineIdentifier, behavior: MockBehavior) -> Self {
        Self {
            engine,
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            segments: vec![TextSegment::from_text("Mock text")],
            custom_response: None,
        }
    }

    pub fn working(engine: impl Into<EngineIdentifier>) -> Self {
        Self::new(engine.into(), MockBehavior::Working)
    }

    pub fn failing(engine: impl Into<EngineIdentifier>, error: ProviderError) -> Self {
        Self::new(engine.into(), MockBehavior::Failing(error))
    }

    pub fn intermittent(engine: impl Into<EngineIdentifier>, fail_every: usize) -> Self {
        Self::new(engine.into(), MockBehavior::Intermittent { fail_every })
    }

    pub fn slow(engine: impl Into<EngineIdentifier>, delay_ms: u64) -> Self {
        Self::new(engine.into(), MockBehavior::Slow { delay_ms })
    }

    pub fn empty(engine: impl Into<EngineIdentifier>) -> Self {
        Self::new(engine.into(), MockBehavior::Empty)
    }

    pub fn unavailable(engine: impl Into<EngineIdentifier>) -> Self {
        Self::new(engine.into(), MockBehavior::Unavailable)
    }

    /// Segments to return from text extraction
    pub fn with_segments(mut self, segments: Vec<TextSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&TranslationRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of calls made so far (translate and analyze)
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Shared outcome logic; `Ok(false)` means answer empty
    async fn outcome(&self) -> Result<bool, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Working => Ok(true),
            MockBehavior::Failing(error) => Err(error.clone()),
            MockBehavior::Intermittent { fail_every } => {
                let every = (*fail_every).max(1);
                if count % every == every - 1 {
                    Err(ProviderError::NetworkError(format!("simulated failure on request {}", count + 1)))
                } else {
                    Ok(true)
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(true)
            }
            MockBehavior::Empty => Ok(false),
            MockBehavior::Unavailable => Err(ProviderError::NotAvailable),
        }
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn engine(&self) -> EngineIdentifier {
        self.engine
    }

    async fn is_available(&self) -> bool {
        self.behavior != MockBehavior::Unavailable
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }
        if !self.outcome().await? {
            return Err(ProviderError::TranslationFailed("empty response".to_string()));
        }

        // Use custom response if set, otherwise generate default
        let text = match self.custom_response {
            Some(generator) => generator(&request),
            None => format!("[{}] {}", request.target_language, request.text),
        };
        Ok(request.result(text))
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn engine(&self) -> EngineIdentifier {
        self.engine
    }

    async fn is_available(&self) -> bool {
        self.behavior != MockBehavior::Unavailable
    }

    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        _system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let segments = if self.outcome().await? {
            self.segments.clone()
        } else {
            Vec::new()
        };
        Ok(ScreenAnalysisResult::new(segments, image.size()))
    }
}
