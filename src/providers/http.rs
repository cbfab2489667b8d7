/*!
 * HTTP plumbing shared by the network providers.
 *
 * Status mapping, `Retry-After` parsing, the timeout race and the in-flight
 * guard live here so each provider only deals with its own wire format.
 */

use chrono::{DateTime, Utc};
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;

/// Maximum characters of a response body kept in error messages
const ERROR_BODY_LIMIT: usize = 500;

/// OpenAI puts the backoff in prose: "Please try again in 20s" / "in 1.5s" / "in 350ms"
static OPENAI_RETRY_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)try again in\s+(\d+(?:\.\d+)?)\s*(ms|s)").expect("valid regex")
});

/// Build the HTTP client used by one provider instance
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .unwrap_or_default()
}

/// A non-success HTTP response, read to completion
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpFailure {
    pub async fn from_response(response: Response) -> Self {
        let status = response.status().as_u16();
        let retry_after = retry_after_header(response.headers());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        Self {
            status,
            retry_after,
            body,
        }
    }

    /// Best human readable message from the body
    pub fn message(&self) -> String {
        extract_error_message(&self.body)
    }
}

/// `Retry-After` as seconds: either an integer or an HTTP date
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    if let Ok(seconds) = value.parse::<f64>() {
        return (seconds.is_finite() && seconds >= 0.0).then(|| seconds.ceil() as u64);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.num_seconds().max(0) as u64)
}

pub fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Backoff hint from an OpenAI error message
pub fn openai_retry_hint(body: &str) -> Option<u64> {
    let captures = OPENAI_RETRY_HINT.captures(body)?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let seconds = match captures.get(2)?.as_str().to_lowercase().as_str() {
        "ms" => amount / 1000.0,
        _ => amount,
    };
    Some(seconds.ceil().max(1.0) as u64)
}

/// Backoff hint from a Google RPC error (`error.details[].retryDelay: "30s"`)
pub fn gemini_retry_hint(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["details"]
        .as_array()?
        .iter()
        .filter_map(|detail| detail["retryDelay"].as_str())
        .find_map(|delay| delay.trim_end_matches('s').parse::<f64>().ok())
        .map(|seconds| seconds.ceil() as u64)
}

/// Pull a message out of common JSON error shapes, else the truncated body
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            &value["error"]["message"],
            &value["error"],
            &value["message"],
            &value["detail"],
            &value["errorMsg"],
        ];
        if let Some(message) = candidates.iter().find_map(|v| v.as_str()) {
            return message.to_string();
        }
    }
    truncate(body.trim())
}

fn truncate(text: &str) -> String {
    if text.chars().count() > ERROR_BODY_LIMIT {
        format!("{}...", text.chars().take(ERROR_BODY_LIMIT).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Status mapping for vision/model providers
pub fn map_vision_status(failure: &HttpFailure, model: &str, body_retry_hint: Option<u64>) -> ProviderError {
    let message = failure.message();
    error!("Vision API error ({}): {}", failure.status, message);
    match failure.status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        429 => ProviderError::RateLimited {
            retry_after_secs: failure.retry_after.or(body_retry_hint),
            message: (!message.is_empty()).then_some(message),
        },
        404 => ProviderError::ModelUnavailable(model.to_string()),
        400 => ProviderError::InvalidConfiguration(message),
        500..=599 => ProviderError::NetworkError(format!("server error {}: {}", failure.status, message)),
        status => ProviderError::InvalidResponse(format!("unexpected status {}: {}", status, message)),
    }
}

/// Status mapping for translation providers
pub fn map_translation_status(failure: &HttpFailure, body_retry_hint: Option<u64>) -> ProviderError {
    let message = failure.message();
    error!("Translation API error ({}): {}", failure.status, message);
    match failure.status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        429 => ProviderError::RateLimited {
            retry_after_secs: failure.retry_after.or(body_retry_hint),
            message: (!message.is_empty()).then_some(message),
        },
        status => ProviderError::HttpError {
            status_code: status,
            message,
        },
    }
}

/// Which error table a call reports through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMapping {
    Translation,
    Vision,
}

impl StatusMapping {
    pub fn map(self, failure: &HttpFailure, model: &str, body_retry_hint: Option<u64>) -> ProviderError {
        match self {
            Self::Translation => map_translation_status(failure, body_retry_hint),
            Self::Vision => map_vision_status(failure, model, body_retry_hint),
        }
    }
}

/// Map a transport error
pub fn map_send_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            after_secs: timeout.as_secs(),
        }
    } else if error.is_connect() {
        ProviderError::NetworkError(format!("connection failed: {}", error))
    } else {
        ProviderError::NetworkError(error.to_string())
    }
}

/// Read a success body and decode it
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::NetworkError(format!("failed to read response: {}", e)))?;
    serde_json::from_str(&text).map_err(|e| {
        debug!("Undecodable response body: {}", truncate(&text));
        ProviderError::InvalidResponse(format!("{}: {}", e, truncate(&text)))
    })
}

/// Race a provider call against a timer; the loser is dropped
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        result = call => result,
        _ = tokio::time::sleep(timeout) => Err(ProviderError::Timeout { after_secs: timeout.as_secs() }),
    }
}

/// Single in-flight call guard for one provider instance
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

/// Held while a call is in flight; releases the guard on drop
#[derive(Debug)]
pub struct InFlightToken<'a> {
    flag: &'a AtomicBool,
}

impl InFlight {
    pub fn acquire(&self) -> Result<InFlightToken<'_>, ProviderError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProviderError::OperationInProgress)?;
        Ok(InFlightToken { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
