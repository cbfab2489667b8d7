/*!
 * Segment extraction from recovered JSON.
 *
 * Accepts the shape vision prompts ask for (`{"segments":[...]}`) and the
 * usual model deviations: a bare array, `bbox`/`bounding_box` keys, boxes given
 * as `[x, y, w, h]`, and pixel coordinates instead of normalized ones.
 */

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use super::json_repair::{RepairStrategy, parse_model_json, preview};
use crate::errors::ProviderError;
use crate::models::{BoundingBox, ImageSize, TextSegment};

/// Tolerance when deciding whether two segments describe the same text box
const DUPLICATE_BOX_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBox {
    Object {
        x: f64,
        y: f64,
        #[serde(alias = "w")]
        width: f64,
        #[serde(alias = "h")]
        height: f64,
    },
    Array(Vec<f64>),
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    text: String,
    #[serde(default, alias = "boundingBox", alias = "bbox")]
    bounding_box: Option<RawBox>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl RawBox {
    fn to_bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Object { x, y, width, height } => Some(BoundingBox::new(*x, *y, *width, *height)),
            Self::Array(values) if values.len() == 4 => {
                Some(BoundingBox::new(values[0], values[1], values[2], values[3]))
            }
            Self::Array(_) => None,
        }
    }
}

/// Bring a box into the normalized frame, converting pixel units if needed
pub fn normalize_box(bbox: BoundingBox, image_size: ImageSize) -> BoundingBox {
    if bbox.looks_like_pixels() && image_size.width > 0 && image_size.height > 0 {
        BoundingBox::from_pixels(bbox.x, bbox.y, bbox.width, bbox.height, image_size)
    } else {
        bbox.clamped()
    }
}

/// Segments found in a JSON value; `None` when the value has no segment list
pub fn segments_from_value(value: &Value, image_size: ImageSize) -> Option<Vec<TextSegment>> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("segments")
            .or_else(|| map.get("results"))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    let segments = list
        .iter()
        .filter_map(|item| match serde_json::from_value::<RawSegment>(item.clone()) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!("Skipping malformed segment: {}", e);
                None
            }
        })
        .filter(|raw| !raw.text.trim().is_empty())
        .map(|raw| {
            let bbox = raw
                .bounding_box
                .as_ref()
                .and_then(RawBox::to_bounding_box)
                .unwrap_or_default();
            let confidence = raw.confidence.filter(|c| c.is_finite()).unwrap_or(1.0).clamp(0.0, 1.0);
            TextSegment::new(raw.text.trim(), normalize_box(bbox, image_size), confidence)
        })
        .collect();

    Some(segments)
}

/// Segments recovered from one model response
#[derive(Debug, Clone)]
pub struct ParsedSegments {
    pub segments: Vec<TextSegment>,
    pub strategy: RepairStrategy,
}

/// Parse a vision model response into normalized segments.
///
/// A clean parse may legitimately contain no text. A lossy repair that yields
/// nothing usable is a `ParsingFailed` error.
pub fn parse_segments(text: &str, image_size: ImageSize) -> Result<ParsedSegments, ProviderError> {
    let repaired = parse_model_json(text)?;
    let segments = segments_from_value(&repaired.value, image_size).ok_or_else(|| {
        ProviderError::ParsingFailed(format!("no segment list in output: {}", preview(text)))
    })?;

    if segments.is_empty() && repaired.strategy.is_lossy() {
        return Err(ProviderError::ParsingFailed(format!(
            "repaired output contained no usable segments: {}",
            preview(text)
        )));
    }
    if repaired.strategy.is_lossy() {
        warn!(
            "Model output was truncated; recovered {} segments via {:?}",
            segments.len(),
            repaired.strategy
        );
    }

    Ok(ParsedSegments {
        segments,
        strategy: repaired.strategy,
    })
}

fn same_segment(a: &TextSegment, b: &TextSegment) -> bool {
    let close = |l: f64, r: f64| (l - r).abs() <= DUPLICATE_BOX_TOLERANCE;
    a.text == b.text
        && close(a.bounding_box.x, b.bounding_box.x)
        && close(a.bounding_box.y, b.bounding_box.y)
        && close(a.bounding_box.width, b.bounding_box.width)
        && close(a.bounding_box.height, b.bounding_box.height)
}

/// Append segments from a continuation turn, skipping ones already seen.
///
/// Returns how many new segments were added.
pub fn merge_continuation(accumulated: &mut Vec<TextSegment>, incoming: Vec<TextSegment>) -> usize {
    let before = accumulated.len();
    for segment in incoming {
        if !accumulated.iter().any(|existing| same_segment(existing, &segment)) {
            accumulated.push(segment);
        }
    }
    accumulated.len() - before
}
