/*!
 * Engine identifiers, usage scenes and selection modes.
 *
 * An engine is addressed either by a fixed [`EngineType`] or, for user-configured
 * OpenAI-compatible endpoints, by an instance index. Identifiers are plain `Copy`
 * values and are used as cache keys by the registry.
 */

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in engine kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EngineType {
    /// Platform translation / text recognition supplied by the host
    #[default]
    Apple,
    /// Self-hosted MTranServer
    MtranServer,
    #[serde(rename = "openai")]
    OpenAI,
    Claude,
    Gemini,
    Ollama,
    Google,
    #[serde(rename = "deepl")]
    DeepL,
    Baidu,
    /// Single user-defined OpenAI-compatible endpoint
    Custom,
    /// PaddleOCR (vision only)
    PaddleOcr,
}

impl EngineType {
    /// Every engine type, in display order
    pub const ALL: [EngineType; 11] = [
        EngineType::Apple,
        EngineType::MtranServer,
        EngineType::OpenAI,
        EngineType::Claude,
        EngineType::Gemini,
        EngineType::Ollama,
        EngineType::Google,
        EngineType::DeepL,
        EngineType::Baidu,
        EngineType::Custom,
        EngineType::PaddleOcr,
    ];

    // @returns: Human readable engine name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Apple => "Apple Translation",
            Self::MtranServer => "MTranServer",
            Self::OpenAI => "OpenAI",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
            Self::Ollama => "Ollama",
            Self::Google => "Google Translate",
            Self::DeepL => "DeepL",
            Self::Baidu => "Baidu Translate",
            Self::Custom => "Custom",
            Self::PaddleOcr => "PaddleOCR",
        }
    }

    // @returns: Stable identifier used in config files and secret keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::MtranServer => "mtranServer",
            Self::OpenAI => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Google => "google",
            Self::DeepL => "deepl",
            Self::Baidu => "baidu",
            Self::Custom => "custom",
            Self::PaddleOcr => "paddleOcr",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        EngineType::ALL
            .iter()
            .copied()
            .find(|engine| engine.as_str().to_lowercase() == lowered)
            .or(match lowered.as_str() {
                "anthropic" => Some(EngineType::Claude),
                "mtran" => Some(EngineType::MtranServer),
                "paddle" | "paddleocr" => Some(EngineType::PaddleOcr),
                _ => None,
            })
            .ok_or_else(|| anyhow!("Invalid engine type: {}", s))
    }
}

/// Key used to select and cache a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineIdentifier {
    /// One of the built-in engines
    Standard(EngineType),
    /// A user-configured OpenAI-compatible endpoint
    Compatible { index: usize },
}

impl EngineIdentifier {
    pub const fn standard(engine: EngineType) -> Self {
        Self::Standard(engine)
    }

    pub const fn compatible(index: usize) -> Self {
        Self::Compatible { index }
    }

    /// The engine type backing this identifier. Compatible instances are OpenAI-style.
    pub fn engine_type(&self) -> EngineType {
        match self {
            Self::Standard(engine) => *engine,
            Self::Compatible { .. } => EngineType::Custom,
        }
    }

    /// Name under which credentials for this engine are stored
    pub fn secret_key(&self) -> String {
        match self {
            Self::Standard(engine) => engine.as_str().to_lowercase(),
            Self::Compatible { index } => format!("compatible_{}", index),
        }
    }

    pub fn is_compatible(&self) -> bool {
        matches!(self, Self::Compatible { .. })
    }
}

impl From<EngineType> for EngineIdentifier {
    fn from(engine: EngineType) -> Self {
        Self::Standard(engine)
    }
}

impl fmt::Display for EngineIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(engine) => write!(f, "{}", engine),
            Self::Compatible { index } => write!(f, "compatible:{}", index),
        }
    }
}

impl FromStr for EngineIdentifier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(index) = s.trim().strip_prefix("compatible:") {
            let index = index
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid compatible engine index: {}", s))?;
            return Ok(Self::Compatible { index });
        }
        Ok(Self::Standard(s.parse()?))
    }
}

impl TryFrom<String> for EngineIdentifier {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EngineIdentifier> for String {
    fn from(value: EngineIdentifier) -> Self {
        value.to_string()
    }
}

/// Usage context used to pick a default engine binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TranslationScene {
    /// Region screenshot translated in place
    #[default]
    Screenshot,
    /// Text selected in another application
    TextSelection,
    /// Selected text replaced by its translation in the focused application
    TranslateAndInsert,
}

impl TranslationScene {
    pub const ALL: [TranslationScene; 3] = [
        TranslationScene::Screenshot,
        TranslationScene::TextSelection,
        TranslationScene::TranslateAndInsert,
    ];
}

impl fmt::Display for TranslationScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Screenshot => "screenshot",
            Self::TextSelection => "textSelection",
            Self::TranslateAndInsert => "translateAndInsert",
        };
        write!(f, "{}", name)
    }
}

/// Orchestration policy applied when resolving which engines handle a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    #[default]
    PrimaryWithFallback,
    Parallel,
    QuickSwitch,
    SceneBinding,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrimaryWithFallback => "primaryWithFallback",
            Self::Parallel => "parallel",
            Self::QuickSwitch => "quickSwitch",
            Self::SceneBinding => "sceneBinding",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SelectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primarywithfallback" | "fallback" => Ok(Self::PrimaryWithFallback),
            "parallel" => Ok(Self::Parallel),
            "quickswitch" | "single" => Ok(Self::QuickSwitch),
            "scenebinding" | "scene" => Ok(Self::SceneBinding),
            _ => Err(anyhow!("Invalid selection mode: {}", s)),
        }
    }
}

/// Engine-specific defaults and capabilities
#[derive(Debug, Clone)]
pub struct EngineProfile {
    /// Whether the engine cannot work without an API key
    pub requires_api_key: bool,
    /// Whether the engine can translate text
    pub supports_translation: bool,
    /// Whether the engine can extract text from images
    pub supports_vision: bool,
    /// Whether the engine exposes a native batch translation call
    pub supports_batch: bool,
    /// Default request timeout in seconds
    pub default_timeout_secs: u64,
    /// Default service endpoint (empty when not applicable)
    pub default_endpoint: &'static str,
    /// Default model name (empty when not applicable)
    pub default_model: &'static str,
}

impl EngineProfile {
    /// Get the profile for a given engine
    pub fn for_engine(engine: EngineType) -> Self {
        match engine {
            EngineType::Apple => Self {
                requires_api_key: false,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 15,
                default_endpoint: "",
                default_model: "",
            },
            EngineType::MtranServer => Self {
                requires_api_key: false,
                supports_translation: true,
                supports_vision: false,
                supports_batch: false,
                default_timeout_secs: 10,
                default_endpoint: "http://localhost:8989",
                default_model: "",
            },
            EngineType::OpenAI => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 60,
                default_endpoint: "https://api.openai.com/v1",
                default_model: "gpt-4o-mini",
            },
            EngineType::Claude => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 60,
                default_endpoint: "https://api.anthropic.com",
                default_model: "claude-3-5-haiku-latest",
            },
            EngineType::Gemini => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 60,
                default_endpoint: "https://generativelanguage.googleapis.com",
                default_model: "gemini-2.0-flash",
            },
            EngineType::Ollama => Self {
                // Local server, no key, slow first load
                requires_api_key: false,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 120,
                default_endpoint: "http://localhost:11434",
                default_model: "qwen2.5vl:7b",
            },
            EngineType::Google => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: false,
                supports_batch: true,
                default_timeout_secs: 15,
                default_endpoint: "https://translation.googleapis.com",
                default_model: "",
            },
            EngineType::DeepL => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: false,
                supports_batch: true,
                default_timeout_secs: 15,
                default_endpoint: "",
                default_model: "",
            },
            EngineType::Baidu => Self {
                requires_api_key: true,
                supports_translation: true,
                supports_vision: false,
                supports_batch: false,
                default_timeout_secs: 15,
                default_endpoint: "https://fanyi-api.baidu.com",
                default_model: "",
            },
            EngineType::Custom => Self {
                requires_api_key: false,
                supports_translation: true,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 60,
                default_endpoint: "http://localhost:1234/v1",
                default_model: "local-model",
            },
            EngineType::PaddleOcr => Self {
                requires_api_key: false,
                supports_translation: false,
                supports_vision: true,
                supports_batch: false,
                default_timeout_secs: 60,
                default_endpoint: "http://127.0.0.1:8080",
                default_model: "",
            },
        }
    }
}
