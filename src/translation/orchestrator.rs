/*!
 * Orchestration of translation and text extraction across engines.
 *
 * Selection modes:
 * 1. Primary with fallback: the fallback runs only after the primary failed
 * 2. Parallel: every engine runs, results are kept in completion order
 * 3. Quick switch: one engine, no fallback
 * 4. Scene binding: the scene's engines, with fallback
 *
 * Providers never retry on their own; this layer decides what runs next.
 */

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::engine::{EngineIdentifier, SelectionMode, TranslationScene};
use crate::errors::{ProviderError, TranslationError};
use crate::image_utils::ImageData;
use crate::models::{
    BilingualSegment, EngineResult, ScreenAnalysisResult, TextSegment, TranslationResult, TranslationResultBundle,
};
use crate::registry::ProviderRegistry;
use crate::translation::prompts::{PromptKind, resolve_override};
use crate::translation::scenes;

/// One orchestrated translation call. Unset fields come from the settings.
#[derive(Debug, Clone, Default)]
pub struct OrchestrationRequest {
    pub segments: Vec<TextSegment>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub mode: Option<SelectionMode>,
    pub scene: Option<TranslationScene>,
    pub primary: Option<EngineIdentifier>,
    pub fallback: Option<EngineIdentifier>,
    pub fallback_enabled: Option<bool>,
    pub parallel_engines: Vec<EngineIdentifier>,
}

impl OrchestrationRequest {
    /// Request for plain texts; each becomes a full-frame segment
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_segments(texts.into_iter().map(TextSegment::from_text).collect())
    }

    pub fn from_segments(segments: Vec<TextSegment>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    pub fn source(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    pub fn target(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }

    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn scene(mut self, scene: TranslationScene) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn primary(mut self, engine: EngineIdentifier) -> Self {
        self.primary = Some(engine);
        self
    }

    /// Set the fallback engine and enable fallback
    pub fn fallback(mut self, engine: EngineIdentifier) -> Self {
        self.fallback = Some(engine);
        self.fallback_enabled = Some(true);
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_enabled = Some(false);
        self
    }

    pub fn parallel(mut self, engines: Vec<EngineIdentifier>) -> Self {
        self.parallel_engines = engines;
        self
    }
}

/// Outcome of a text extraction call
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub engine: EngineIdentifier,
    pub analysis: ScreenAnalysisResult,
    pub latency: Duration,
    /// Set when the configured vision engine failed and the fallback answered
    pub fallback_from: Option<EngineIdentifier>,
}

/// Languages and prompt context shared by every engine in one call
struct CallContext<'a> {
    config: &'a Config,
    segments: &'a [TextSegment],
    source_language: Option<String>,
    target_language: String,
    scene: Option<TranslationScene>,
}

/// Coordinates providers from the registry according to a selection mode
#[derive(Debug, Clone)]
pub struct OrchestrationService {
    registry: Arc<ProviderRegistry>,
}

impl OrchestrationService {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Translate the request's segments under its selection mode
    pub async fn translate(&self, request: OrchestrationRequest) -> Result<TranslationResultBundle, TranslationError> {
        let config = self.registry.settings();
        let mode = request.mode.unwrap_or(config.selection_mode);
        let source_language = request
            .source_language
            .clone()
            .unwrap_or_else(|| config.source_language.clone());
        let context = CallContext {
            config: &config,
            segments: &request.segments,
            source_language: (!crate::language_utils::is_auto(&source_language)).then_some(source_language),
            target_language: request
                .target_language
                .clone()
                .unwrap_or_else(|| config.target_language.clone()),
            scene: request.scene,
        };

        let primary = request.primary.unwrap_or(config.preferred_engine);
        let fallback = if request.fallback_enabled.unwrap_or(config.fallback_enabled) {
            request.fallback.or(config.fallback_engine)
        } else {
            None
        };

        info!(
            "Translating {} segments to {} ({})",
            request.segments.len(),
            context.target_language,
            mode
        );

        match mode {
            SelectionMode::PrimaryWithFallback => self.with_fallback(&context, primary, fallback, mode).await,
            SelectionMode::QuickSwitch => {
                let (segments, latency) = self.run_engine(&context, primary).await?;
                Ok(TranslationResultBundle::new(
                    vec![EngineResult::Success {
                        engine: primary,
                        segments,
                        latency,
                    }],
                    primary,
                    mode,
                    context.scene,
                    None,
                ))
            }
            SelectionMode::SceneBinding => {
                let scene = request.scene.unwrap_or_default();
                let binding = scenes::binding_for(&config, scene);
                let fallback = binding.fallback_engine.filter(|_| binding.fallback_enabled);
                let context = CallContext {
                    scene: Some(scene),
                    ..context
                };
                self.with_fallback(&context, binding.primary_engine, fallback, mode).await
            }
            SelectionMode::Parallel => {
                let mut engines = if request.parallel_engines.is_empty() {
                    config.parallel_engines.clone()
                } else {
                    request.parallel_engines.clone()
                };
                if engines.is_empty() {
                    engines.push(primary);
                }
                Ok(self.parallel(&context, engines).await)
            }
        }
    }

    /// Run the primary; on any failure run the fallback, if there is one
    async fn with_fallback(
        &self,
        context: &CallContext<'_>,
        primary: EngineIdentifier,
        fallback: Option<EngineIdentifier>,
        mode: SelectionMode,
    ) -> Result<TranslationResultBundle, TranslationError> {
        let primary_error = match self.run_engine(context, primary).await {
            Ok((segments, latency)) => {
                return Ok(TranslationResultBundle::new(
                    vec![EngineResult::Success {
                        engine: primary,
                        segments,
                        latency,
                    }],
                    primary,
                    mode,
                    context.scene,
                    None,
                ));
            }
            Err(e) => e,
        };

        let Some(fallback) = fallback.filter(|f| *f != primary) else {
            return Err(primary_error);
        };
        warn!("{} failed ({}); falling back to {}", primary, primary_error, fallback);

        match self.run_engine(context, fallback).await {
            Ok((segments, latency)) => Ok(TranslationResultBundle::new(
                vec![EngineResult::Success {
                    engine: fallback,
                    segments,
                    latency,
                }],
                fallback,
                mode,
                context.scene,
                Some(primary),
            )),
            Err(fallback_error) => Err(TranslationError::AllEnginesFailed(vec![primary_error, fallback_error])),
        }
    }

    /// Run every engine concurrently and keep every outcome
    async fn parallel(&self, context: &CallContext<'_>, engines: Vec<EngineIdentifier>) -> TranslationResultBundle {
        let mut unique: Vec<EngineIdentifier> = Vec::with_capacity(engines.len());
        for engine in engines {
            if !unique.contains(&engine) {
                unique.push(engine);
            }
        }
        let primary = unique[0];

        let mut pending: FuturesUnordered<_> = unique
            .iter()
            .map(|engine| {
                let engine = *engine;
                async move { (engine, self.run_engine(context, engine).await) }
            })
            .collect();

        let mut results = Vec::with_capacity(unique.len());
        while let Some((engine, outcome)) = pending.next().await {
            results.push(match outcome {
                Ok((segments, latency)) => EngineResult::Success {
                    engine,
                    segments,
                    latency,
                },
                Err(error) => {
                    debug!("Parallel engine {} failed: {}", engine, error);
                    EngineResult::Failure { engine, error }
                }
            });
        }

        TranslationResultBundle::new(results, primary, SelectionMode::Parallel, context.scene, None)
    }

    /// One engine over all segments
    async fn run_engine(
        &self,
        context: &CallContext<'_>,
        engine: EngineIdentifier,
    ) -> Result<(Vec<BilingualSegment>, Duration), TranslationError> {
        let start_time = Instant::now();
        if context.segments.is_empty() {
            return Ok((Vec::new(), start_time.elapsed()));
        }

        let handle = self
            .registry
            .get_provider(engine, &context.config.compatible_engines, false)?;
        let translator = handle.translator()?;
        if !translator.is_available().await {
            return Err(TranslationError::provider(engine, ProviderError::NotAvailable));
        }

        let prompt = resolve_override(context.config, engine, context.scene, PromptKind::Translation)
            .map(|template| template.render(context.source_language.as_deref(), &context.target_language));
        let texts: Vec<String> = context.segments.iter().map(|s| s.text.clone()).collect();

        let results = translator
            .translate_batch(
                &texts,
                context.source_language.as_deref(),
                &context.target_language,
                prompt.as_deref(),
            )
            .await
            .map_err(|e| TranslationError::provider(engine, e))?;

        let segments = realign(context.segments, results).map_err(|e| TranslationError::provider(engine, e))?;
        let latency = start_time.elapsed();
        debug!("{} translated {} segments in {:?}", engine, segments.len(), latency);
        Ok((segments, latency))
    }

    /// Extract text with the configured vision engine, falling back if set
    pub async fn analyze(
        &self,
        image: &ImageData,
        scene: TranslationScene,
    ) -> Result<AnalysisOutcome, TranslationError> {
        let config = self.registry.settings();
        let primary = config.vision.engine;

        let primary_error = match self.run_vision(&config, image, scene, primary).await {
            Ok((analysis, latency)) => {
                return Ok(AnalysisOutcome {
                    engine: primary,
                    analysis,
                    latency,
                    fallback_from: None,
                });
            }
            Err(e) => e,
        };

        let Some(fallback) = config.vision.fallback_engine.filter(|f| *f != primary) else {
            return Err(primary_error);
        };
        warn!("Vision engine {} failed ({}); falling back to {}", primary, primary_error, fallback);

        match self.run_vision(&config, image, scene, fallback).await {
            Ok((analysis, latency)) => Ok(AnalysisOutcome {
                engine: fallback,
                analysis,
                latency,
                fallback_from: Some(primary),
            }),
            Err(fallback_error) => Err(TranslationError::AllEnginesFailed(vec![primary_error, fallback_error])),
        }
    }

    async fn run_vision(
        &self,
        config: &Config,
        image: &ImageData,
        scene: TranslationScene,
        engine: EngineIdentifier,
    ) -> Result<(ScreenAnalysisResult, Duration), TranslationError> {
        let start_time = Instant::now();
        let handle = self.registry.get_provider(engine, &config.compatible_engines, false)?;
        let recognizer = handle.recognizer()?;
        if !recognizer.is_available().await {
            return Err(TranslationError::provider(engine, ProviderError::NotAvailable));
        }

        let prompt = resolve_override(config, engine, Some(scene), PromptKind::Vision)
            .map(|template| template.render(None, &config.target_language));
        let analysis = recognizer
            .analyze_with_prompt(image, prompt.as_deref())
            .await
            .map_err(|e| TranslationError::provider(engine, e))?;

        let latency = start_time.elapsed();
        info!("{} found {} segments in {:?}", engine, analysis.segments.len(), latency);
        Ok((analysis, latency))
    }

    /// Extract text from a capture, then translate the segments found
    pub async fn analyze_and_translate(
        &self,
        image: &ImageData,
        request: OrchestrationRequest,
    ) -> Result<TranslationResultBundle, TranslationError> {
        let scene = request.scene.unwrap_or(TranslationScene::Screenshot);
        let outcome = self.analyze(image, scene).await?;
        let request = OrchestrationRequest {
            segments: outcome.analysis.segments,
            scene: Some(scene),
            ..request
        };
        self.translate(request).await
    }
}

/// Pair each segment with its translation, matching by source text when the
/// provider returned results out of order
fn realign(segments: &[TextSegment], results: Vec<TranslationResult>) -> Result<Vec<BilingualSegment>, ProviderError> {
    if results.len() != segments.len() {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {} translations, got {}",
            segments.len(),
            results.len()
        )));
    }

    let mut remaining: Vec<Option<TranslationResult>> = results.into_iter().map(Some).collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let in_place = remaining[i].as_ref().is_some_and(|r| r.source_text == segment.text);
            let index = if in_place {
                Some(i)
            } else {
                remaining
                    .iter()
                    .position(|r| r.as_ref().is_some_and(|r| r.source_text == segment.text))
            };
            let translation = index.and_then(|idx| remaining[idx].take()).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("no translation returned for {:?}", segment.text))
            })?;
            Ok(BilingualSegment::new(segment.clone(), translation))
        })
        .collect()
}
