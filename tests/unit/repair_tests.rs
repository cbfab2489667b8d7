/*!
 * Tests for recovering segments from model and OCR output
 */

use screentrans::errors::ProviderError;
use screentrans::models::{BoundingBox, ImageSize, ScreenAnalysisResult, TextSegment};
use screentrans::parsing::{RepairStrategy, merge_continuation, parse_segments, python_literal_to_json};
use screentrans::providers::paddle::parse_cli_output;

const FRAME: ImageSize = ImageSize { width: 1000, height: 500 };

#[test]
fn test_parseSegments_chattyFencedOutput_shouldRecoverSegments() {
    let output = "```json\n{\"segments\": [\n  {\"text\": \"File\", \"boundingBox\": {\"x\": 0.01, \"y\": 0.02, \"width\": 0.05, \"height\": 0.03}, \"confidence\": 0.98},\n  {\"text\": \"Edit\", \"bbox\": [0.07, 0.02, 0.05, 0.03]}\n]}\n```";
    let parsed = parse_segments(output, FRAME).unwrap();

    assert_eq!(parsed.strategy, RepairStrategy::StrippedFences);
    assert_eq!(parsed.segments.len(), 2);
    assert_eq!(parsed.segments[0].confidence, 0.98);
    assert_eq!(parsed.segments[1].confidence, 1.0);
    assert!(parsed.segments.iter().all(|s| s.bounding_box.is_normalized()));
}

#[test]
fn test_parseSegments_pixelBoxes_shouldBeNormalized() {
    let output = r#"{"segments":[{"text":"Title","bbox":{"x":100,"y":50,"w":500,"h":100}}]}"#;
    let parsed = parse_segments(output, FRAME).unwrap();

    let bbox = parsed.segments[0].bounding_box;
    assert!((bbox.x - 0.1).abs() < 1e-9);
    assert!((bbox.y - 0.1).abs() < 1e-9);
    assert!((bbox.width - 0.5).abs() < 1e-9);
    assert!((bbox.height - 0.2).abs() < 1e-9);
}

#[test]
fn test_parseSegments_truncatedOutput_shouldKeepCompleteSegments() {
    let output = r#"{"segments":[{"text":"First line","bbox":[0.1,0.1,0.3,0.05],"confidence":0.9},{"text":"Second line","bbox":[0.1,0.2,0.3,0.05],"confidence":0.8},{"te"#;
    let parsed = parse_segments(output, FRAME).unwrap();

    assert!(parsed.strategy.is_lossy());
    let texts: Vec<&str> = parsed.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["First line", "Second line"]);
}

#[test]
fn test_parseSegments_noJson_shouldFail() {
    let result = parse_segments("I could not find any text in this image.", FRAME);
    assert!(matches!(result, Err(ProviderError::ParsingFailed(_))));
}

#[test]
fn test_parseSegments_blankTexts_shouldBeDropped() {
    let parsed = parse_segments(r#"[{"text":"  "},{"text":" Hi "}]"#, FRAME).unwrap();
    assert_eq!(parsed.segments.len(), 1);
    assert_eq!(parsed.segments[0].text, "Hi");
}

#[test]
fn test_mergeContinuation_shouldAppendOnlyNewSegments() {
    let first = parse_segments(
        r#"{"segments":[{"text":"A","bbox":[0.1,0.1,0.1,0.1]},{"text":"B","bbox":[0.1,0.3,0.1,0.1]}]}"#,
        FRAME,
    )
    .unwrap();
    let second = parse_segments(
        r#"{"segments":[{"text":"B","bbox":[0.1,0.3,0.1,0.1]},{"text":"C","bbox":[0.1,0.5,0.1,0.1]}]}"#,
        FRAME,
    )
    .unwrap();

    let mut all = first.segments;
    assert_eq!(merge_continuation(&mut all, second.segments), 1);
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].text, "C");
}

#[test]
fn test_pythonLiteral_paddleResult_shouldBecomeValidJson() {
    let literal = "{'res': {'input_path': '/tmp/x.png', 'page_index': None, 'rec_texts': ['Hello', \"it's\"], 'rec_scores': array([0.99, 0.9]), 'rec_boxes': array([[10, 20, 110, 40], [10, 60, 90, 80]], dtype=int16)}}";
    let value: serde_json::Value = serde_json::from_str(&python_literal_to_json(literal)).unwrap();

    assert!(value["res"]["page_index"].is_null());
    assert_eq!(value["res"]["rec_texts"][1], "it's");
    assert_eq!(value["res"]["rec_boxes"][0][2], 110);
}

#[test]
fn test_parseCliOutput_shouldSkipLogLinesAndNormalizeBoxes() {
    let stdout = "Creating model: ('PP-OCRv5_server_det', None)\n\
        {'res': {'rec_texts': ['Menu', 'Quit'], 'rec_scores': array([0.97, 0.88], dtype=float32), \
        'rec_boxes': array([[100,  50, 300, 100],\n       [100, 150, 200, 200]], dtype=int16)}}\n";
    let segments = parse_cli_output(stdout, FRAME).unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text, "Menu");
    assert!((segments[0].confidence - 0.97).abs() < 1e-6);
    let bbox = segments[0].bounding_box;
    assert!((bbox.x - 0.1).abs() < 1e-9);
    assert!((bbox.width - 0.2).abs() < 1e-9);
    assert!((bbox.height - 0.1).abs() < 1e-9);
}

#[test]
fn test_parseSegments_ownSerializedResult_shouldRoundTrip() {
    let original = ScreenAnalysisResult::new(
        vec![
            TextSegment::new("Bottom right", BoundingBox::new(0.8, 0.9, 0.2, 0.1), 0.87),
            TextSegment::new("Whole frame", BoundingBox::full(), 1.0),
            TextSegment::new("Right edge", BoundingBox::new(0.25, 0.5, 0.75, 0.5), 0.5),
            TextSegment::new("Corner", BoundingBox::new(0.999, 0.999, 0.001, 0.001), 0.0),
        ],
        FRAME,
    );

    let json = serde_json::to_string_pretty(&original).unwrap();
    let parsed = parse_segments(&json, FRAME).unwrap();
    assert_eq!(parsed.strategy, RepairStrategy::None);

    let reparsed = ScreenAnalysisResult::new(parsed.segments, FRAME);
    assert_eq!(reparsed, original);
}
