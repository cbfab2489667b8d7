/*!
 * Error types for the screentrans library.
 *
 * `ProviderError` covers everything a single backend can fail with, for both
 * translation and vision engines. `TranslationError` is what the orchestration
 * layer surfaces: a provider error tagged with its engine, an aggregate of
 * primary and fallback failures, or an engine with no registered provider.
 *
 * Every error maps to an [`ErrorKind`] so a UI can offer a targeted remedy
 * instead of a generic alert.
 */

use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineIdentifier;

/// Errors that can occur inside a single provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The engine cannot serve requests right now (missing credentials, server down)
    #[error("Engine is not available")]
    NotAvailable,

    /// Nothing to translate
    #[error("Input text is empty")]
    EmptyInput,

    /// Missing or invalid credentials, URLs or models
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connection failures and server-side errors
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete within the configured duration
    #[error("Request timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    /// The service asked us to slow down
    #[error("Rate limit exceeded{}{}",
        .retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default(),
        .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: Option<String>,
    },

    /// Unexpected HTTP status from a translation service
    #[error("HTTP error {status_code}: {message}")]
    HttpError { status_code: u16, message: String },

    /// The service answered but did not produce a translation
    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The configured model does not exist on the server
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The captured image could not be encoded for upload
    #[error("Image encoding failed: {0}")]
    ImageEncodingFailed(String),

    /// Model output could not be turned into segments, even after repair
    #[error("Failed to parse model output: {0}")]
    ParsingFailed(String),

    /// The provider instance is already serving a call
    #[error("Another operation is already in progress")]
    OperationInProgress,
}

/// Broad error category used to choose a remedy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    RateLimited,
    Network,
    Timeout,
    Unavailable,
    InvalidInput,
    InvalidResponse,
    Parsing,
    Busy,
    NotRegistered,
    AllEnginesFailed,
}

/// What a UI should offer the user for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    OpenSettings,
    Retry,
    SwitchEngine,
    None,
}

impl ErrorKind {
    pub fn remedy(&self) -> Remedy {
        match self {
            Self::Configuration | Self::Authentication | Self::NotRegistered => Remedy::OpenSettings,
            Self::RateLimited | Self::Network | Self::Timeout | Self::Busy => Remedy::Retry,
            Self::Unavailable | Self::InvalidResponse | Self::Parsing | Self::AllEnginesFailed => {
                Remedy::SwitchEngine
            }
            Self::InvalidInput => Remedy::None,
        }
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAvailable | Self::ModelUnavailable(_) => ErrorKind::Unavailable,
            Self::EmptyInput | Self::ImageEncodingFailed(_) => ErrorKind::InvalidInput,
            Self::InvalidConfiguration(_) => ErrorKind::Configuration,
            Self::NetworkError(_) => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::HttpError { status_code, .. } if *status_code >= 500 => ErrorKind::Network,
            Self::HttpError { .. } | Self::TranslationFailed(_) | Self::InvalidResponse(_) => {
                ErrorKind::InvalidResponse
            }
            Self::AuthenticationFailed(_) => ErrorKind::Authentication,
            Self::ParsingFailed(_) => ErrorKind::Parsing,
            Self::OperationInProgress => ErrorKind::Busy,
        }
    }

    /// Whether trying again later (or elsewhere) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::Busy
        )
    }

    /// Server-provided backoff hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs: Some(secs), .. } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Errors surfaced by the orchestration layer
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// A provider call failed
    #[error("{engine}: {source}")]
    Provider {
        engine: EngineIdentifier,
        source: ProviderError,
    },

    /// Both the primary and the fallback engine failed
    #[error("All engines failed: {}", summarize(.0))]
    AllEnginesFailed(Vec<TranslationError>),

    /// No provider exists for this engine
    #[error("No provider registered for engine {0}")]
    NotRegistered(EngineIdentifier),
}

fn summarize(errors: &[TranslationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TranslationError {
    pub fn provider(engine: EngineIdentifier, source: ProviderError) -> Self {
        Self::Provider { engine, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider { source, .. } => source.kind(),
            Self::AllEnginesFailed(_) => ErrorKind::AllEnginesFailed,
            Self::NotRegistered(_) => ErrorKind::NotRegistered,
        }
    }

    /// Engine the error belongs to, if it is about a single engine
    pub fn engine(&self) -> Option<EngineIdentifier> {
        match self {
            Self::Provider { engine, .. } | Self::NotRegistered(engine) => Some(*engine),
            Self::AllEnginesFailed(_) => None,
        }
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Underlying errors of an aggregate, or the error itself
    pub fn underlying(&self) -> Vec<&TranslationError> {
        match self {
            Self::AllEnginesFailed(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

/// Main application error type used by the command-line host
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from orchestration
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
