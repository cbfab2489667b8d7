/*!
 * Google Cloud Translation v2 client.
 *
 * The `q` field takes an array, so a whole batch goes out in one request and
 * comes back in input order.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{self, HttpFailure};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::language_utils::to_google_code;
use crate::models::TranslationResult;

#[derive(Debug)]
pub struct GoogleTranslate {
    client: Client,
    config: ProviderConfiguration,
}

#[derive(Debug, Serialize)]
pub struct GoogleTranslateRequest<'a> {
    q: &'a [String],
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTranslateResponse {
    pub data: GoogleTranslateData,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTranslateData {
    #[serde(default)]
    pub translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTranslation {
    pub translated_text: String,
    #[serde(default)]
    pub detected_source_language: Option<String>,
}

impl GoogleTranslate {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
        }
    }

    async fn send(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<Vec<GoogleTranslation>, ProviderError> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/language/translate/v2", self.config.endpoint());
        let body = GoogleTranslateRequest {
            q: texts,
            target: to_google_code(target_language),
            source: source_language.map(to_google_code),
            format: "text",
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(http::map_translation_status(&failure, None));
        }

        let decoded: GoogleTranslateResponse = http::decode_json(response).await?;
        let translations = decoded.data.translations;
        if translations.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} translations, got {}",
                texts.len(),
                translations.len()
            )));
        }
        Ok(translations)
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslate {
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
        let texts = [request.text.clone()];
        let call = self.send(&texts, request.source_language.as_deref(), &request.target_language);
        let mut translations = http::with_timeout(self.config.timeout, call).await?;
        let translation = translations.remove(0);

        let mut result = request.result(translation.translated_text);
        if result.source_language.is_none() {
            result.source_language = translation.detected_source_language;
        }
        Ok(result)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
        _system_prompt: Option<&str>,
    ) -> Result<Vec<TranslationResult>, ProviderError> {
        let source = source_language.filter(|s| !crate::language_utils::is_auto(s));
        let pending: Vec<String> = texts.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
        if pending.is_empty() {
            return Ok(texts
                .iter()
                .map(|t| TranslationResult::new(t.clone(), t.clone(), source.map(str::to_string), target_language))
                .collect());
        }

        debug!("Google batch of {} texts", pending.len());
        let call = self.send(&pending, source, target_language);
        let mut translated = http::with_timeout(self.config.timeout, call).await?.into_iter();

        let results = texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    return TranslationResult::new(text.clone(), text.clone(), source.map(str::to_string), target_language);
                }
                let translation = translated.next();
                let detected = translation.as_ref().and_then(|t| t.detected_source_language.clone());
                TranslationResult::new(
                    text.clone(),
                    translation.map(|t| t.translated_text).unwrap_or_default(),
                    source.map(str::to_string).or(detected),
                    target_language,
                )
            })
            .collect();
        Ok(results)
    }
}
