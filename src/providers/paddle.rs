/*!
 * PaddleOCR text extraction.
 *
 * Three transports share one result parser:
 * - `Cli`: run the `paddleocr` command on a temporary PNG and read the Python
 *   `repr` it prints
 * - `LocalServer`: POST the image to a PaddleX serving endpoint
 * - `Cloud`: the same request against a hosted endpoint, with a token
 *
 * Boxes come back in pixels and are normalized against the capture size.
 */

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::http::{self, HttpFailure, InFlight, StatusMapping};
use super::{ProviderConfiguration, VisionProvider};
use crate::app_config::PaddleMode;
use crate::engine::EngineIdentifier;
use crate::errors::ProviderError;
use crate::image_utils::ImageData;
use crate::models::{BoundingBox, ImageSize, ScreenAnalysisResult, TextSegment};
use crate::parsing::json_repair::preview;
use crate::parsing::python_literal_to_json;

/// Executable used when no command is configured
pub const DEFAULT_PADDLE_COMMAND: &str = "paddleocr";

/// `fileType` value for images in the serving API
const FILE_TYPE_IMAGE: u8 = 1;

#[derive(Debug)]
pub struct PaddleOcr {
    client: Client,
    config: ProviderConfiguration,
    in_flight: InFlight,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServingRequest {
    file: String,
    file_type: u8,
}

impl PaddleOcr {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self {
            client: http::build_client(config.timeout),
            config,
            in_flight: InFlight::default(),
        }
    }

    fn command(&self) -> &str {
        self.config
            .command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_PADDLE_COMMAND)
    }

    fn mode(&self) -> PaddleMode {
        // The cloud toggle wins over a stale mode setting
        if self.config.use_cloud {
            PaddleMode::Cloud
        } else {
            self.config.paddle_mode
        }
    }

    /// Run the command line on a temp PNG, killing it on timeout
    async fn run_cli(&self, image: &ImageData) -> Result<String, ProviderError> {
        let executable = resolve_command(self.command()).ok_or_else(|| {
            ProviderError::InvalidConfiguration(format!("PaddleOCR command not found: {}", self.command()))
        })?;
        let png = image.write_temp_png()?;
        let mut command = Command::new(&executable);
        command
            .arg("ocr")
            .arg("--input")
            .arg(png.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(language) = self.config.ocr_language.as_deref().filter(|l| !l.is_empty()) {
            command.arg("--lang").arg(language);
        }

        let mut child = command.spawn().map_err(|e| {
            ProviderError::InvalidConfiguration(format!("failed to start {}: {}", self.command(), e))
        })?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::InvalidResponse("no stdout from PaddleOCR".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::InvalidResponse("no stderr from PaddleOCR".to_string()))?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let finished = tokio::select! {
            result = async {
                let (o, e, status) = tokio::join!(
                    stdout.read_to_end(&mut out),
                    stderr.read_to_end(&mut err),
                    child.wait()
                );
                o.and(e).and(status)
            } => Some(result),
            _ = tokio::time::sleep(self.config.timeout) => None,
        };

        let status = match finished {
            Some(result) => result.map_err(|e| ProviderError::InvalidResponse(format!("PaddleOCR I/O: {}", e)))?,
            None => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out PaddleOCR process: {}", e);
                }
                return Err(ProviderError::Timeout {
                    after_secs: self.config.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&out).into_owned();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            error!("PaddleOCR exited with {}: {}", status, preview(&stderr));
            return Err(ProviderError::InvalidResponse(format!(
                "PaddleOCR exited with {}: {}",
                status,
                preview(stderr.trim())
            )));
        }
        Ok(stdout)
    }

    async fn run_serving(&self, image: &ImageData, mode: PaddleMode) -> Result<Value, ProviderError> {
        let url = format!("{}/ocr", self.config.endpoint());
        let body = ServingRequest {
            file: image.to_png_base64()?,
            file_type: FILE_TYPE_IMAGE,
        };

        let mut builder = self.client.post(&url).json(&body);
        if mode == PaddleMode::Cloud {
            let token = self.config.require_api_key()?;
            builder = builder.header("Authorization", format!("token {}", token));
        }
        let response = builder
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(StatusMapping::Vision.map(&failure, "paddleocr", None));
        }

        let value: Value = http::decode_json(response).await?;
        if let Some(code) = value.get("errorCode").and_then(Value::as_i64).filter(|c| *c != 0) {
            let message = value["errorMsg"].as_str().unwrap_or("unknown error");
            return Err(ProviderError::InvalidResponse(format!("PaddleOCR error {}: {}", code, message)));
        }
        Ok(value)
    }
}

/// Locate an executable: a path is checked as given, a bare name is searched on `PATH`
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    let path = Path::new(command);
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

/// Parse what the command line printed; log lines may precede the result
pub fn parse_cli_output(stdout: &str, image_size: ImageSize) -> Result<Vec<TextSegment>, ProviderError> {
    let start = stdout
        .find("{'res'")
        .or_else(|| stdout.find('{'))
        .ok_or_else(|| ProviderError::ParsingFailed(format!("no result in PaddleOCR output: {}", preview(stdout))))?;

    let json = python_literal_to_json(&stdout[start..]);
    let value: Value = serde_json::from_str(&json).map_err(|e| {
        debug!("Converted PaddleOCR output: {}", preview(&json));
        ProviderError::ParsingFailed(format!("PaddleOCR output is not a literal: {}", e))
    })?;
    segments_from_ocr_value(&value, image_size)
}

/// Find the first object carrying `rec_texts` anywhere in the tree
fn find_ocr_result(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) if map.contains_key("rec_texts") => Some(value),
        Value::Object(map) => map.values().find_map(find_ocr_result),
        Value::Array(items) => items.iter().find_map(find_ocr_result),
        _ => None,
    }
}

/// Pixel box from `[x1, y1, x2, y2]` or a polygon of points
fn pixel_box(value: &Value) -> Option<(f64, f64, f64, f64)> {
    let items = value.as_array()?;
    if items.len() == 4 && items.iter().all(Value::is_number) {
        let v: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
        return Some((v[0], v[1], v[2], v[3]));
    }

    let points: Vec<(f64, f64)> = items
        .iter()
        .filter_map(|p| {
            let p = p.as_array()?;
            Some((p.first()?.as_f64()?, p.get(1)?.as_f64()?))
        })
        .collect();
    if points.is_empty() {
        return None;
    }
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    Some((min_x, min_y, max_x, max_y))
}

/// Segments from a PaddleOCR result tree (CLI or serving shape)
pub fn segments_from_ocr_value(value: &Value, image_size: ImageSize) -> Result<Vec<TextSegment>, ProviderError> {
    let result = find_ocr_result(value)
        .ok_or_else(|| ProviderError::ParsingFailed("PaddleOCR result has no rec_texts".to_string()))?;

    let texts = result["rec_texts"].as_array().cloned().unwrap_or_default();
    let scores = result["rec_scores"].as_array();
    let boxes = result["rec_boxes"]
        .as_array()
        .filter(|b| !b.is_empty())
        .or_else(|| result["rec_polys"].as_array());

    let segments = texts
        .iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let text = text.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            let confidence = scores
                .and_then(|s| s.get(i))
                .and_then(Value::as_f64)
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            let bounding_box = boxes
                .and_then(|b| b.get(i))
                .and_then(pixel_box)
                .map(|(x1, y1, x2, y2)| {
                    BoundingBox::from_pixels(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0), image_size)
                })
                .unwrap_or_default();
            Some(TextSegment::new(text, bounding_box, confidence))
        })
        .collect();
    Ok(segments)
}

#[async_trait]
impl VisionProvider for PaddleOcr {
    fn engine(&self) -> EngineIdentifier {
        self.config.engine
    }

    async fn is_available(&self) -> bool {
        match self.mode() {
            PaddleMode::Cli => resolve_command(self.command()).is_some(),
            PaddleMode::LocalServer => !self.config.base_url.trim().is_empty(),
            PaddleMode::Cloud => self.config.has_api_key() && !self.config.base_url.trim().is_empty(),
        }
    }

    /// PaddleOCR is not prompt driven; the prompt is ignored
    async fn analyze_with_prompt(
        &self,
        image: &ImageData,
        _system_prompt: Option<&str>,
    ) -> Result<ScreenAnalysisResult, ProviderError> {
        let _guard = self.in_flight.acquire()?;
        let size = image.size();
        let mode = self.mode();
        debug!("PaddleOCR {:?} on {}x{} capture", mode, size.width, size.height);

        let segments = match mode {
            PaddleMode::Cli => {
                let stdout = self.run_cli(image).await?;
                parse_cli_output(&stdout, size)?
            }
            PaddleMode::LocalServer | PaddleMode::Cloud => {
                let value = http::with_timeout(self.config.timeout, self.run_serving(image, mode)).await?;
                segments_from_ocr_value(&value, size)?
            }
        };
        Ok(ScreenAnalysisResult::new(segments, size))
    }
}
