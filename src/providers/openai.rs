/*!
 * OpenAI Chat Completions client.
 *
 * Serves the `openai` engine, the single `custom` endpoint and every
 * OpenAI-compatible instance. Vision requests send the capture as a data URL
 * and continue truncated answers for a bounded number of turns.
 */

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{self, HttpFailure, InFlight, StatusMapping};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest, VisionProvider};
use crate::engine::{EngineIdentifier, EngineType};
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{ScreenAnalysisResult, TextSegment, TranslationResult};
use crate::parsing::{merge_continuation, parse_segments};
use crate::translation::prompts::PromptTemplate;

/// Finish reason reported when the output hit `max_tokens`
const FINISH_LENGTH: &str = "length";

/// OpenAI-style client
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    config: ProviderConfiguration,
    in_flight: InFlight,
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// Chat message with either plain or multi-part content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Content block of a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// User message carrying an instruction and a base64 JPEG
    pub fn user_with_image(text: impl Into<String>, jpeg_base64: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{}", jpeg_base64),
                        detail: Some("high".to_string()),
                    },
                },
            ]),
        }
    }
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            stream: false,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl ChatCompletionResponse {
    /// Text of the first choice and whether it was cut off
    pub fn first_text(&self) -> Option<(&str, bool)> {
        let choice = self.choices.first()?;
        let truncated = choice.finish_reason.as_deref() == Some(FINISH_LENGTH);
        Some((choice.message.content.as_deref().unwrap_or_default(), truncated))
    }
}

impl OpenAI {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
            in_flight: InFlight::default(),
        }
    }

    /// Only the hosted OpenAI engine insists on a key
    fn requires_api_key(&self) -> bool {
        self.config.engine == EngineIdentifier::Standard(EngineType::OpenAI)
    }

    fn check_configuration(&self) -> Result<(), ProviderError> {
        if self.config.base_url.trim().is_empty() {
            return Err(ProviderError::InvalidConfiguration(format!("{} has no endpoint", self.config.engine)));
        }
        if self.config.model.trim().is_empty() {
            return Err(ProviderError::InvalidConfiguration(format!("{} has no model", self.config.engine)));
        }
        if self.requires_api_key() {
            self.config.require_api_key()?;
        }
        Ok(())
    }

    /// Send one chat completion request
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
        mapping: StatusMapping,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.config.endpoint());
        let mut builder = self.client.post(&url).json(request);
        if self.config.has_api_key() {
            builder = builder.bearer_auth(self.config.api_key.trim());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            let hint = http::openai_retry_hint(&failure.body);
            return Err(mapping.map(&failure, &self.config.model, hint));
        }

        http::decode_json(response).await
    }
}

#[async_trait]
impl TranslationProvider for OpenAI {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.check_configuration().is_ok()
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }
        self.check_configuration()?;

        let chat = ChatCompletionRequest::new(
            &self.config.model,
            vec![
                ChatMessage::system(request.resolved_system_prompt()),
                ChatMessage::user(&request.text),
            ],
        )
        .max_tokens(self.config.max_tokens)
        .temperature(self.config.temperature);

        let response = http::with_timeout(self.config.timeout, self.complete(&chat, StatusMapping::Translation)).await?;
        let (text, truncated) = response
            .first_text()
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))?;
        if truncated {
            warn!("{} translation hit the token limit", self.config.engine);
        }

        let translated = super::clean_model_translation(text);
        if translated.is_empty() {
            return Err(ProviderError::TranslationFailed("model returned no text".to_string()));
        }
        Ok(request.result(translated))
    }
}

#[async_trait]
impl VisionProvider for OpenAI {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        self.config.supports_vision && self.check_configuration().is_ok()
    }

    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let _guard = self.in_flight.acquire()?;
        self.check_configuration()?;
        if !self.config.supports_vision {
            return Err(ProviderError::InvalidConfiguration(format!(
                "{} is not configured for image input",
                self.config.engine
            )));
        }

        let size = image.size();
        let jpeg = image.to_jpeg_base64(self.config.jpeg_quality)?;
        let mut messages = vec![
            ChatMessage::system(system_prompt.unwrap_or(PromptTemplate::VISION_OCR)),
            ChatMessage::user_with_image("Extract all text from this screenshot.", &jpeg),
        ];

        let max_attempts = self.config.max_continuation_attempts.max(1);
        let mut segments: Vec<TextSegment> = Vec::new();
        let mut transcript = String::new();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let request = ChatCompletionRequest::new(&self.config.model, messages.clone())
                .max_tokens(self.config.vision_max_tokens)
                .temperature(0.0);
            let response = http::with_timeout(self.config.timeout, self.complete(&request, StatusMapping::Vision)).await?;
            let (content, truncated) = response
                .first_text()
                .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))?;

            // Continuations resume mid-JSON; the joined transcript holds every segment so far
            transcript.push_str(content);
            match parse_segments(&transcript, size) {
                Ok(parsed) => {
                    debug!(
                        "Attempt {}: {} segments in transcript ({:?})",
                        attempt,
                        parsed.segments.len(),
                        parsed.strategy
                    );
                    segments = parsed.segments;
                }
                // A model that restarted the object instead of continuing it
                Err(transcript_error) => match parse_segments(content, size) {
                    Ok(parsed) => {
                        let added = merge_continuation(&mut segments, parsed.segments);
                        debug!("Attempt {}: {} new segments from a restarted answer", attempt, added);
                    }
                    Err(_) if truncated => last_error = Some(transcript_error),
                    Err(e) if segments.is_empty() => return Err(e),
                    Err(e) => warn!("Ignoring unparseable continuation: {}", e),
                },
            }

            if !truncated {
                break;
            }
            if attempt == max_attempts {
                warn!(
                    "{} output still truncated after {} attempts; returning {} segments",
                    self.config.engine,
                    attempt,
                    segments.len()
                );
                break;
            }
            messages.push(ChatMessage::assistant(content));
            messages.push(ChatMessage::user(PromptTemplate::VISION_CONTINUE));
        }

        if segments.is_empty() {
            if let Some(error) = last_error {
                return Err(error);
            }
        }
        Ok(ScreenAnalysisResult::new(segments, size))
    }
}
