/*!
 * Turning free-form model output into canonical segments.
 *
 * - `json_repair`: fence stripping, object extraction, truncation repair and salvage
 * - `python_literal`: Python/NumPy literal text to JSON
 * - `segments`: JSON value to normalized [`TextSegment`](crate::models::TextSegment)s
 */

pub mod json_repair;
pub mod python_literal;
pub mod segments;

pub use json_repair::{RepairStrategy, Repaired, parse_model_json, repair_truncated_json, salvage_partial_json, strip_code_fences};
pub use python_literal::python_literal_to_json;
pub use segments::{ParsedSegments, merge_continuation, parse_segments, segments_from_value};
