/*!
 * Scene to engine routing.
 *
 * A scene without an explicit binding gets a built-in one: the preferred
 * engine as primary, and the fallback engine when fallback is enabled. Text
 * scenes carry short strings, so when no fallback engine is configured they
 * fall back to on-device Apple translation. A screenshot has no built-in
 * fallback because it already went through a vision engine.
 */

use crate::app_config::Config;
use crate::engine::{EngineIdentifier, EngineType, TranslationScene};
use crate::models::SceneEngineBinding;

/// Fallback a scene uses when the configuration names none
pub fn builtin_fallback(scene: TranslationScene) -> Option<EngineIdentifier> {
    match scene {
        TranslationScene::Screenshot => None,
        TranslationScene::TextSelection | TranslationScene::TranslateAndInsert => {
            Some(EngineIdentifier::Standard(EngineType::Apple))
        }
    }
}

/// Binding used when the configuration has none for `scene`
pub fn default_binding(config: &Config, scene: TranslationScene) -> SceneEngineBinding {
    let binding = SceneEngineBinding::new(scene, config.preferred_engine);
    match config.fallback_engine.or_else(|| builtin_fallback(scene)) {
        Some(fallback) if config.fallback_enabled && fallback != config.preferred_engine => {
            binding.with_fallback(fallback)
        }
        _ => binding,
    }
}

/// Configured binding for `scene`, else the default one
pub fn binding_for(config: &Config, scene: TranslationScene) -> SceneEngineBinding {
    config
        .scene_binding(scene)
        .cloned()
        .unwrap_or_else(|| default_binding(config, scene))
}

/// Effective binding of every scene
pub fn all_bindings(config: &Config) -> Vec<SceneEngineBinding> {
    TranslationScene::ALL
        .iter()
        .map(|scene| binding_for(config, *scene))
        .collect()
}
