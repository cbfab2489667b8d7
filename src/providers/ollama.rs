use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::http::{self, HttpFailure, InFlight, StatusMapping};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest, VisionProvider};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{ScreenAnalysisResult, TranslationResult};
use crate::parsing::parse_segments;
use crate::translation::prompts::PromptTemplate;

/// Health probes must answer quickly; a cold model load is not a health failure
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// HTTP client for making requests
    client: Client,
    config: ProviderConfiguration,
    in_flight: InFlight,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Base64 images for multimodal models
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    images: Vec<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// "stop" or "length"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub done_reason: Option<String>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            images: Vec::new(),
            options: None,
            stream: false,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach a base64 encoded image
    pub fn image(mut self, image_base64: impl Into<String>) -> Self {
        self.images.push(image_base64.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Cap the number of generated tokens
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }
}

impl GenerationResponse {
    pub fn is_truncated(&self) -> bool {
        self.done_reason.as_deref() == Some("length")
    }

    /// Parse a response body, tolerating servers that stream JSONL despite `stream: false`
    pub fn from_body(body: &str) -> Result<Self, ProviderError> {
        if let Ok(response) = serde_json::from_str::<Self>(body) {
            return Ok(response);
        }

        let chunks: Vec<Self> = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<Self>(line).ok())
            .collect();
        if chunks.is_empty() {
            error!("Failed to parse Ollama API response: {}", crate::parsing::json_repair::preview(body));
            return Err(ProviderError::InvalidResponse("Ollama returned invalid JSON".to_string()));
        }

        debug!("Reassembling {} streamed Ollama chunks", chunks.len());
        let response = chunks.iter().map(|c| c.response.as_str()).collect::<String>();
        let last = chunks.last();
        Ok(Self {
            model: last.map(|c| c.model.clone()).unwrap_or_default(),
            response,
            done: true,
            done_reason: last.and_then(|c| c.done_reason.clone()),
            eval_count: last.and_then(|c| c.eval_count),
        })
    }
}

impl Ollama {
    /// Create a new Ollama client
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
            in_flight: InFlight::default(),
        }
    }

    /// Generate text from the Ollama API
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        mapping: StatusMapping,
    ) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.config.endpoint());

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(mapping.map(&failure, &self.config.model, None));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("Failed to get response text from Ollama API: {}", e)))?;
        GenerationResponse::from_body(&body)
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.config.endpoint());
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, HEALTH_CHECK_TIMEOUT))?;
        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(http::map_translation_status(&failure, None));
        }

        let value: serde_json::Value = http::decode_json(response).await?;
        value["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse("Invalid version format in response".to_string()))
    }

    async fn probe(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!("Ollama {} reachable at {}", version, self.config.endpoint());
                true
            }
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for Ollama {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.probe().await
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let generation = GenerationRequest::new(&self.config.model, &request.text)
            .system(request.resolved_system_prompt())
            .temperature(self.config.temperature)
            .num_predict(self.config.max_tokens);

        let response =
            http::with_timeout(self.config.timeout, self.generate(&generation, StatusMapping::Translation)).await?;
        if response.is_truncated() {
            warn!("Ollama translation hit the token limit");
        }

        let translated = super::clean_model_translation(&response.response);
        if translated.is_empty() {
            return Err(ProviderError::TranslationFailed("model returned no text".to_string()));
        }
        Ok(request.result(translated))
    }
}

#[async_trait]
impl VisionProvider for Ollama {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.probe().await
    }

    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let _guard = self.in_flight.acquire()?;
        let jpeg = image.to_jpeg_base64(self.config.jpeg_quality)?;

        let generation = GenerationRequest::new(&self.config.model, "Extract all text from this screenshot.")
            .system(system_prompt.unwrap_or(PromptTemplate::VISION_OCR))
            .image(jpeg)
            .temperature(0.0)
            .num_predict(self.config.vision_max_tokens);

        let response = http::with_timeout(self.config.timeout, self.generate(&generation, StatusMapping::Vision)).await?;
        if response.is_truncated() {
            warn!("Ollama vision output was truncated; repairing");
        }

        let parsed = parse_segments(&response.response, image.size())?;
        Ok(ScreenAnalysisResult::new(parsed.segments, image.size()))
    }
}
