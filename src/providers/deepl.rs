/*!
 * DeepL v2 translation client.
 *
 * Free-tier keys end in `:fx` and must use the `api-free` host. DeepL
 * reports an exhausted quota as HTTP 456.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{self, HttpFailure};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::language_utils::{is_auto, to_deepl_code};
use crate::models::TranslationResult;

const DEEPL_FREE_URL: &str = "https://api-free.deepl.com";
const DEEPL_PRO_URL: &str = "https://api.deepl.com";

/// Quota exceeded
const STATUS_QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug)]
pub struct DeepL {
    client: Client,
    config: ProviderConfiguration,
}

#[derive(Debug, Serialize)]
pub struct DeepLRequest<'a> {
    text: &'a [String],
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    #[serde(default)]
    pub translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    pub text: String,
    #[serde(default)]
    pub detected_source_language: Option<String>,
}

/// Host for a key: explicit endpoint wins, else free or pro by key suffix
pub fn deepl_base_url(api_key: &str, configured: &str) -> String {
    let configured = configured.trim().trim_end_matches('/');
    if !configured.is_empty() {
        return configured.to_string();
    }
    if api_key.trim().ends_with(":fx") {
        DEEPL_FREE_URL.to_string()
    } else {
        DEEPL_PRO_URL.to_string()
    }
}

impl DeepL {
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
    ) -> Result<Vec<DeepLTranslation>, ProviderError> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/v2/translate", deepl_base_url(api_key, &self.config.base_url));
        let body = DeepLRequest {
            text: texts,
            target_lang: to_deepl_code(target_language, true),
            source_lang: source_language.map(|s| to_deepl_code(s, false)),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            if failure.status == STATUS_QUOTA_EXCEEDED {
                return Err(ProviderError::RateLimited {
                    retry_after_secs: failure.retry_after,
                    message: Some("DeepL quota exceeded".to_string()),
                });
            }
            return Err(http::map_translation_status(&failure, None));
        }

        let decoded: DeepLResponse = http::decode_json(response).await?;
        if decoded.translations.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} translations, got {}",
                texts.len(),
                decoded.translations.len()
            )));
        }
        Ok(decoded.translations)
    }
}

#[async_trait]
impl TranslationProvider for DeepL {
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

        let mut result = request.result(translation.text);
        if result.source_language.is_none() {
            result.source_language = translation.detected_source_language.map(|l| l.to_lowercase());
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
        let source = source_language.filter(|s| !is_auto(s));
        let pending: Vec<String> = texts.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
        let mut translated = if pending.is_empty() {
            Vec::new().into_iter()
        } else {
            debug!("DeepL batch of {} texts", pending.len());
            let call = self.send(&pending, source, target_language);
            http::with_timeout(self.config.timeout, call).await?.into_iter()
        };

        let results = texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    return TranslationResult::new(text.clone(), text.clone(), source.map(str::to_string), target_language);
                }
                let translation = translated.next();
                let detected = translation
                    .as_ref()
                    .and_then(|t| t.detected_source_language.as_ref())
                    .map(|l| l.to_lowercase());
                TranslationResult::new(
                    text.clone(),
                    translation.map(|t| t.text).unwrap_or_default(),
                    source.map(str::to_string).or(detected),
                    target_language,
                )
            })
            .collect();
        Ok(results)
    }
}
