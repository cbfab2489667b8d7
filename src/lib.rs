/*!
 * # screentrans - screen translation engine core
 *
 * Routes text captured from the screen through translation and text
 * extraction engines.
 *
 * ## Features
 *
 * - Translation engines:
 *   - Apple on-device translation (through a platform bridge)
 *   - MTranServer (local)
 *   - OpenAI, Anthropic Claude, Google Gemini, Ollama and any
 *     OpenAI-compatible server
 *   - Google Cloud Translation and DeepL
 * - Text extraction with vision models and PaddleOCR
 * - Primary/fallback, parallel, quick switch and per-scene engine selection
 * - Repair of truncated or malformed model JSON
 *
 * ## Architecture
 *
 * - `app_config`: settings and their live snapshot
 * - `engine`: engine identifiers, scenes and selection modes
 * - `models`: segments, results and bundles
 * - `providers`: one client per engine behind two traits
 * - `registry`: cached provider instances keyed by engine
 * - `translation`: orchestration, scenes and prompts
 * - `parsing`: JSON repair and Python literal conversion
 * - `secrets`: API key storage
 * - `errors`: error types
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod engine;
pub mod errors;
pub mod image_utils;
pub mod language_utils;
pub mod models;
pub mod parsing;
pub mod providers;
pub mod registry;
pub mod secrets;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, SettingsSource, SharedSettings};
pub use engine::{EngineIdentifier, EngineType, SelectionMode, TranslationScene};
pub use errors::{AppError, ErrorKind, ProviderError, TranslationError};
pub use image_utils::ImageData;
pub use models::{
    BilingualSegment, BoundingBox, EngineResult, ScreenAnalysisResult, TextSegment, TranslationResult,
    TranslationResultBundle,
};
pub use registry::{EngineHandle, ProviderRegistry};
pub use translation::{OrchestrationRequest, OrchestrationService};
