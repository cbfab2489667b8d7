use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{self, HttpFailure, InFlight, StatusMapping};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest, VisionProvider};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{ScreenAnalysisResult, TranslationResult};
use crate::parsing::parse_segments;
use crate::translation::prompts::PromptTemplate;

/// API version header value required by the Messages API
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic client for interacting with Anthropic API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    config: ProviderConfiguration,
    in_flight: InFlight,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content blocks of the message
    pub content: Vec<ContentBlock>,
}

/// Request content block
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Inline image payload
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    /// Why generation stopped ("end_turn", "max_tokens", ...)
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: Option<String>,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a text message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: vec![ContentBlock::Text { text: content.into() }],
        });
        self
    }

    /// Add a user message with a base64 JPEG followed by an instruction
    pub fn add_image_message(mut self, jpeg_base64: impl Into<String>, instruction: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: "user".to_string(),
            content: vec![
                ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: "image/jpeg".to_string(),
                        data: jpeg_base64.into(),
                    },
                },
                ContentBlock::Text { text: instruction.into() },
            ],
        });
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
            in_flight: InFlight::default(),
        }
    }

    /// Complete a messages request
    pub async fn complete(
        &self,
        request: &AnthropicRequest,
        mapping: StatusMapping,
    ) -> Result<AnthropicResponse, ProviderError> {
        let api_key = self.config.require_api_key()?;
        let api_url = format!("{}/v1/messages", self.config.endpoint());

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(mapping.map(&failure, &self.config.model, None));
        }

        http::decode_json(response).await
    }

    /// Extract text from Anthropic response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect()
    }
}

impl AnthropicResponse {
    pub fn is_truncated(&self) -> bool {
        self.stop_reason.as_deref() == Some("max_tokens")
    }
}

#[async_trait]
impl TranslationProvider for Anthropic {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.config.has_api_key()
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let message = AnthropicRequest::new(&self.config.model, self.config.max_tokens)
            .system(request.resolved_system_prompt())
            .temperature(self.config.temperature)
            .add_message("user", &request.text);

        let response = http::with_timeout(self.config.timeout, self.complete(&message, StatusMapping::Translation)).await?;
        if response.is_truncated() {
            warn!("Claude translation hit the token limit");
        }

        let translated = super::clean_model_translation(&Self::extract_text_from_response(&response));
        if translated.is_empty() {
            return Err(ProviderError::TranslationFailed("model returned no text".to_string()));
        }
        Ok(request.result(translated))
    }
}

#[async_trait]
impl VisionProvider for Anthropic {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.config.has_api_key()
    }

    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let _guard = self.in_flight.acquire()?;
        let jpeg = image.to_jpeg_base64(self.config.jpeg_quality)?;

        let message = AnthropicRequest::new(&self.config.model, self.config.vision_max_tokens)
            .system(system_prompt.unwrap_or(PromptTemplate::VISION_OCR))
            .temperature(0.0)
            .add_image_message(jpeg, "Extract all text from this screenshot.");

        let response = http::with_timeout(self.config.timeout, self.complete(&message, StatusMapping::Vision)).await?;
        if response.is_truncated() {
            warn!("Claude vision output was truncated; repairing");
        }

        let text = Self::extract_text_from_response(&response);
        let parsed = parse_segments(&text, image.size())?;
        Ok(ScreenAnalysisResult::new(parsed.segments, image.size()))
    }
}
