/*!
 * Self-hosted MTranServer client.
 *
 * Plain `{text, from, to}` JSON; availability is a live `GET /health`.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::http::{self, HttpFailure};
use super::{ProviderConfiguration, TranslationProvider, TranslationRequest};
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::language_utils::{AUTO_DETECT, to_mtran_code};
use crate::models::TranslationResult;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct MtranServer {
    client: Client,
    config: ProviderConfiguration,
}

#[derive(Debug, Serialize)]
pub struct MtranRequest<'a> {
    pub text: &'a str,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct MtranResponse {
    #[serde(alias = "result")]
    pub translated_text: String,
    #[serde(default)]
    pub detected_language: Option<String>,
}

impl MtranServer {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
        }
    }

    async fn send(&self, request: &TranslationRequest) -> Result<MtranResponse, ProviderError> {
        let url = format!("{}/translate", self.config.endpoint());
        let body = MtranRequest {
            text: &request.text,
            from: request
                .source_language
                .as_deref()
                .map(to_mtran_code)
                .unwrap_or_else(|| AUTO_DETECT.to_string()),
            to: to_mtran_code(&request.target_language),
        };

        let mut builder = self.client.post(&url).json(&body);
        if self.config.has_api_key() {
            builder = builder.bearer_auth(self.config.api_key.trim());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(http::map_translation_status(&failure, None));
        }
        http::decode_json(response).await
    }
}

#[async_trait]
impl TranslationProvider for MtranServer {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.config.endpoint());
        match self.client.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("MTranServer health check failed: {}", e);
                false
            }
        }
    }

    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let response = http::with_timeout(self.config.timeout, self.send(&request)).await?;
        if response.translated_text.trim().is_empty() {
            return Err(ProviderError::TranslationFailed("server returned an empty translation".to_string()));
        }

        let mut result = request.result(response.translated_text);
        if result.source_language.is_none() {
            result.source_language = response.detected_language.filter(|l| !l.is_empty());
        }
        Ok(result)
    }
}
