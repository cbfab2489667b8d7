/*!
 * System prompts for model-backed engines.
 *
 * This module provides:
 * - Built-in templates for translation and screen text extraction
 * - Resolution of user overrides per (engine, scene)
 */

pub mod templates;

use serde::{Deserialize, Serialize};

use crate::app_config::Config;
use crate::engine::{EngineIdentifier, TranslationScene};

// Re-export main types
pub use templates::PromptTemplate;

/// Which built-in prompt an override replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    #[default]
    Translation,
    Vision,
}

impl PromptKind {
    /// The built-in template for this kind
    pub fn default_template(&self) -> PromptTemplate {
        match self {
            Self::Translation => PromptTemplate::translator(),
            Self::Vision => PromptTemplate::vision(),
        }
    }
}

/// The user override for (engine, scene, kind), only when it differs from the built-in default
pub fn resolve_override(
    config: &Config,
    engine: EngineIdentifier,
    scene: Option<TranslationScene>,
    kind: PromptKind,
) -> Option<PromptTemplate> {
    let template = config.prompt_override(engine, scene, kind)?;
    let trimmed = template.trim();
    if trimmed.is_empty() || trimmed == kind.default_template().as_str().trim() {
        return None;
    }
    Some(PromptTemplate::new(trimmed))
}
