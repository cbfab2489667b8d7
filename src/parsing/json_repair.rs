/*!
 * Recovery of JSON objects from model output.
 *
 * Vision models are asked for bare JSON but regularly wrap it in markdown,
 * prepend commentary, or stop mid-object when they hit their token limit.
 * [`parse_model_json`] walks a fixed ladder of strategies and reports which one
 * produced the value so callers can decide how much to trust it.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::ProviderError;

/// Upper bound on cut points tried by [`salvage_partial_json`]
const MAX_SALVAGE_ATTEMPTS: usize = 64;

/// A string key left without a value at the end of truncated input
static DANGLING_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[{,]\s*"(?:[^"\\]|\\.)*"\s*$"#).expect("valid regex"));

/// How a value was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    /// The text was already valid JSON
    None,
    /// Markdown code fences were removed
    StrippedFences,
    /// The first `{` to the last `}` parsed
    ExtractedObject,
    /// Open strings and brackets were closed
    StructuralRepair,
    /// Input was cut back to the last complete object, then closed
    PartialSalvage,
}

impl RepairStrategy {
    /// Whether content may have been lost or invented
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::StructuralRepair | Self::PartialSalvage)
    }
}

/// A recovered value and how it was obtained
#[derive(Debug, Clone)]
pub struct Repaired {
    pub value: Value,
    pub strategy: RepairStrategy,
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Slice from the first `{` to the last `}`
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Scan state of a JSON prefix
struct ScanState {
    closers: Vec<char>,
    in_string: bool,
    escaped: bool,
}

fn scan(text: &str) -> ScanState {
    let mut state = ScanState {
        closers: Vec::new(),
        in_string: false,
        escaped: false,
    };
    for c in text.chars() {
        if state.in_string {
            if state.escaped {
                state.escaped = false;
            } else if c == '\\' {
                state.escaped = true;
            } else if c == '"' {
                state.in_string = false;
            }
            continue;
        }
        match c {
            '"' => state.in_string = true,
            '{' => state.closers.push('}'),
            '[' => state.closers.push(']'),
            '}' | ']' => {
                if state.closers.last() == Some(&c) {
                    state.closers.pop();
                }
            }
            _ => {}
        }
    }
    state
}

/// Whether every string and bracket in `text` is closed
pub fn is_balanced(text: &str) -> bool {
    let state = scan(text);
    !state.in_string && state.closers.is_empty()
}

/// Close whatever a truncated JSON prefix left open.
///
/// Closes an open string, drops a dangling comma, gives a dangling key or
/// colon a `null` value, then appends the missing `]`/`}` in nesting order.
pub fn repair_truncated_json(text: &str) -> String {
    let state = scan(text);
    let mut out = text.trim_end().to_string();

    if state.in_string {
        if state.escaped {
            out.pop();
        }
        out.push('"');
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
    if out.ends_with(':') {
        out.push_str("null");
    } else if state.closers.last() == Some(&'}') && DANGLING_KEY.is_match(&out) {
        out.push_str(":null");
    }

    out.extend(state.closers.iter().rev());
    out
}

/// Positions of `}` outside string literals
fn object_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '}' {
            ends.push(i);
        }
    }
    ends
}

/// Cut back to the latest complete `}` that yields valid JSON once closed.
///
/// Tries cut points from the end so the longest parseable prefix wins.
pub fn salvage_partial_json(text: &str) -> Option<Value> {
    object_ends(text)
        .into_iter()
        .rev()
        .take(MAX_SALVAGE_ATTEMPTS)
        .find_map(|end| {
            let candidate = repair_truncated_json(&text[..=end]);
            serde_json::from_str::<Value>(&candidate).ok()
        })
}

/// Recover a JSON value from model output, trying increasingly lossy strategies
pub fn parse_model_json(text: &str) -> Result<Repaired, ProviderError> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(Repaired { value, strategy: RepairStrategy::None });
    }

    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(Repaired { value, strategy: RepairStrategy::StrippedFences });
    }

    if let Some(object) = extract_object(stripped) {
        if let Ok(value) = serde_json::from_str::<Value>(object) {
            return Ok(Repaired { value, strategy: RepairStrategy::ExtractedObject });
        }
    }

    let Some(start) = stripped.find('{') else {
        return Err(ProviderError::ParsingFailed(format!(
            "no JSON object in output: {}",
            preview(text)
        )));
    };
    let tail = &stripped[start..];

    let repaired = repair_truncated_json(tail);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        debug!("Recovered truncated model output ({} chars appended)", repaired.len().saturating_sub(tail.trim_end().len()));
        return Ok(Repaired { value, strategy: RepairStrategy::StructuralRepair });
    }

    if let Some(value) = salvage_partial_json(tail) {
        debug!("Recovered model output by salvaging a partial prefix");
        return Ok(Repaired { value, strategy: RepairStrategy::PartialSalvage });
    }

    Err(ProviderError::ParsingFailed(format!(
        "unrecoverable JSON: {}",
        preview(text)
    )))
}

/// First 500 characters, for error messages
pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() > 500 {
        format!("{}...", text.chars().take(500).collect::<String>())
    } else {
        text.to_string()
    }
}
