/*!
 * Canonical result types shared by providers and the orchestration layer.
 *
 * Bounding boxes are always normalized to `[0, 1]` on both axes. Providers that
 * receive pixel coordinates convert them with [`BoundingBox::from_pixels`] before
 * returning a [`ScreenAnalysisResult`].
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::engine::{EngineIdentifier, SelectionMode, TranslationScene};
use crate::errors::TranslationError;

/// Tolerance used when checking the normalized-coordinate invariant
pub const COORDINATE_EPSILON: f64 = 1e-6;

/// Pixel dimensions of a captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Normalized rectangle (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The whole frame
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Convert pixel coordinates into a normalized box
    pub fn from_pixels(x: f64, y: f64, width: f64, height: f64, size: ImageSize) -> Self {
        let w = f64::from(size.width.max(1));
        let h = f64::from(size.height.max(1));
        Self::new(x / w, y / h, width / w, height / h).clamped()
    }

    /// Whether any coordinate lies outside the normalized range
    pub fn looks_like_pixels(&self) -> bool {
        self.x > 1.0 + COORDINATE_EPSILON
            || self.y > 1.0 + COORDINATE_EPSILON
            || self.width > 1.0 + COORDINATE_EPSILON
            || self.height > 1.0 + COORDINATE_EPSILON
    }

    /// Clamp into `[0, 1]` keeping the far edges inside the frame.
    ///
    /// An extent that reaches the edge within `COORDINATE_EPSILON` is kept as is.
    pub fn clamped(&self) -> Self {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
        let fit = |origin: f64, extent: f64| {
            let extent = sanitize(extent).max(0.0);
            if origin + extent > 1.0 + COORDINATE_EPSILON { 1.0 - origin } else { extent }
        };
        let x = sanitize(self.x).clamp(0.0, 1.0);
        let y = sanitize(self.y).clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: fit(x, self.width),
            height: fit(y, self.height),
        }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0 + COORDINATE_EPSILON
            && self.y + self.height <= 1.0 + COORDINATE_EPSILON
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::full()
    }
}

/// A fragment of recognized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub text: String,
    pub bounding_box: BoundingBox,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl TextSegment {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bounding_box,
            confidence,
        }
    }

    /// A segment covering the whole frame, used for plain text input
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text, BoundingBox::full(), 1.0)
    }
}

/// Output of one OCR/VLM call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScreenAnalysisResult {
    pub segments: Vec<TextSegment>,
    pub image_size: ImageSize,
}

impl ScreenAnalysisResult {
    pub fn new(segments: Vec<TextSegment>, image_size: ImageSize) -> Self {
        Self { segments, image_size }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segment texts joined by newlines, in reading order
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One translated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub source_text: String,
    pub translated_text: String,
    /// Detected or requested source language, when known
    pub source_language: Option<String>,
    pub target_language: String,
}

impl TranslationResult {
    pub fn new(
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
        source_language: Option<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            source_language,
            target_language: target_language.into(),
        }
    }
}

/// A recognized segment paired with its translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BilingualSegment {
    pub original: TextSegment,
    pub translation: TranslationResult,
}

impl BilingualSegment {
    pub fn new(original: TextSegment, translation: TranslationResult) -> Self {
        Self { original, translation }
    }

    pub fn translated_text(&self) -> &str {
        &self.translation.translated_text
    }
}

/// Outcome of one engine within an orchestrated call
#[derive(Debug, Clone)]
pub enum EngineResult {
    Success {
        engine: EngineIdentifier,
        segments: Vec<BilingualSegment>,
        latency: Duration,
    },
    Failure {
        engine: EngineIdentifier,
        error: TranslationError,
    },
}

impl EngineResult {
    pub fn engine(&self) -> EngineIdentifier {
        match self {
            Self::Success { engine, .. } | Self::Failure { engine, .. } => *engine,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn segments(&self) -> Option<&[BilingualSegment]> {
        match self {
            Self::Success { segments, .. } => Some(segments),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TranslationError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

/// Everything produced by one orchestrated call. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct TranslationResultBundle {
    pub id: Uuid,
    /// Per-engine outcomes; in parallel mode this is completion order
    pub results: Vec<EngineResult>,
    /// Engine whose result is presented first
    pub primary_engine: EngineIdentifier,
    pub selection_mode: SelectionMode,
    pub scene: Option<TranslationScene>,
    /// Set when the primary engine failed and a fallback produced the result
    pub fallback_from: Option<EngineIdentifier>,
    pub created_at: DateTime<Utc>,
}

impl TranslationResultBundle {
    pub fn new(
        results: Vec<EngineResult>,
        primary_engine: EngineIdentifier,
        selection_mode: SelectionMode,
        scene: Option<TranslationScene>,
        fallback_from: Option<EngineIdentifier>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            results,
            primary_engine,
            selection_mode,
            scene,
            fallback_from,
            created_at: Utc::now(),
        }
    }

    /// Result of a specific engine, looked up by its embedded id
    pub fn result_for(&self, engine: EngineIdentifier) -> Option<&EngineResult> {
        self.results.iter().find(|r| r.engine() == engine)
    }

    /// Segments of the primary engine, or of the first success
    pub fn primary_segments(&self) -> Option<&[BilingualSegment]> {
        self.result_for(self.primary_engine)
            .and_then(EngineResult::segments)
            .or_else(|| self.results.iter().find_map(EngineResult::segments))
    }

    pub fn successful_results(&self) -> impl Iterator<Item = &EngineResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn all_failed(&self) -> bool {
        !self.results.iter().any(EngineResult::is_success)
    }
}

/// Engine routing for one usage scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEngineBinding {
    pub scene: TranslationScene,
    pub primary_engine: EngineIdentifier,
    #[serde(default)]
    pub fallback_engine: Option<EngineIdentifier>,
    #[serde(default)]
    pub fallback_enabled: bool,
}

impl SceneEngineBinding {
    pub fn new(scene: TranslationScene, primary_engine: EngineIdentifier) -> Self {
        Self {
            scene,
            primary_engine,
            fallback_engine: None,
            fallback_enabled: false,
        }
    }

    pub fn with_fallback(mut self, fallback: EngineIdentifier) -> Self {
        self.fallback_engine = Some(fallback);
        self.fallback_enabled = true;
        self
    }
}
