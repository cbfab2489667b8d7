/*!
 * Google Gemini `generateContent` client.
 *
 * The key travels as a query parameter. Rate-limit responses carry their
 * backoff in `error.details[].retryDelay` rather than a header.
 */

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

#[derive(Debug)]
pub struct Gemini {
    client: Client,
    config: ProviderConfiguration,
    in_flight: InFlight,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a content block; Gemini accepts either text or inline bytes
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentRequest {
    pub fn new(max_output_tokens: u32, temperature: f32) -> Self {
        Self {
            contents: Vec::new(),
            system_instruction: None,
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature,
            },
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![Part::Text { text: system.into() }],
        });
        self
    }

    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part::Text { text: text.into() }],
        });
        self
    }

    pub fn user_image(mut self, text: impl Into<String>, jpeg_base64: impl Into<String>) -> Self {
        self.contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![
                Part::Text { text: text.into() },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: "image/jpeg".to_string(),
                        data: jpeg_base64.into(),
                    },
                },
            ],
        });
        self
    }
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate and whether it hit the token cap
    pub fn first_text(&self) -> Option<(String, bool)> {
        let candidate = self.candidates.first()?;
        let text = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<String>();
        let truncated = candidate.finish_reason.as_deref() == Some("MAX_TOKENS");
        Some((text, truncated))
    }
}

impl Gemini {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
            in_flight: InFlight::default(),
        }
    }

    pub async fn generate(
        &self,
        request: &GenerateContentRequest,
        mapping: StatusMapping,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.config.endpoint(), self.config.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            let hint = http::gemini_retry_hint(&failure.body);
            return Err(mapping.map(&failure, &self.config.model, hint));
        }

        http::decode_json(response).await
    }
}

#[async_trait]
impl TranslationProvider for Gemini {
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

        let body = GenerateContentRequest::new(self.config.max_tokens, self.config.temperature)
            .system(request.resolved_system_prompt())
            .user_text(&request.text);

        let response = http::with_timeout(self.config.timeout, self.generate(&body, StatusMapping::Translation)).await?;
        let (text, truncated) = response
            .first_text()
            .ok_or_else(|| ProviderError::TranslationFailed("response has no candidates".to_string()))?;
        if truncated {
            warn!("Gemini translation hit the token limit");
        }

        let translated = super::clean_model_translation(&text);
        if translated.is_empty() {
            return Err(ProviderError::TranslationFailed("model returned no text".to_string()));
        }
        Ok(request.result(translated))
    }
}

#[async_trait]
impl VisionProvider for Gemini {
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

        let body = GenerateContentRequest::new(self.config.vision_max_tokens, 0.0)
            .system(system_prompt.unwrap_or(PromptTemplate::VISION_OCR))
            .user_image("Extract all text from this screenshot.", jpeg);

        let response = http::with_timeout(self.config.timeout, self.generate(&body, StatusMapping::Vision)).await?;
        let (text, truncated) = response
            .first_text()
            .ok_or_else(|| ProviderError::InvalidResponse("response has no candidates".to_string()))?;
        if truncated {
            warn!("Gemini vision output was truncated; repairing");
        }

        let parsed = parse_segments(&text, image.size())?;
        Ok(ScreenAnalysisResult::new(parsed.segments, image.size()))
    }
}
