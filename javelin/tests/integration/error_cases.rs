//! Error handling and edge cases.

use std::path::Path;

use javelin::edit::{AnnotationLayer, DirectiveSet, EditPipeline};
use javelin::{ErrorKind, JavelinError};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{TestPdf, pdf_bytes};

#[tokio::test]
async fn test_missing_input_file() {
    let err = EditPipeline::default()
        .run_file(Path::new("/nonexistent/input.pdf"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, JavelinError::FileNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_directory_as_input() {
    let dir = TempDir::new().unwrap();
    let err = EditPipeline::default()
        .run_file(dir.path(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, JavelinError::NotAFile { .. }));
}

#[rstest]
#[case(b"".as_slice())]
#[case(b"\x89PNG\r\n\x1a\n".as_slice())]
#[case(b"PK\x03\x04".as_slice())]
fn test_non_pdf_bytes(#[case] source: &[u8]) {
    let err = EditPipeline::default().run(source, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}

#[test]
fn test_truncated_pdf_is_invalid_input() {
    let mut source = pdf_bytes(TestPdf::pages(2));
    source.truncate(20);
    let err = EditPipeline::default().run(&source, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_deleting_every_page_is_empty_result() {
    let set = DirectiveSet::from_json(
        r#"{"mode":"sparse","changes":[{"pageNum":1,"deleted":true},{"pageNum":2,"deleted":true}]}"#,
    )
    .unwrap();
    let err = EditPipeline::default()
        .run(&pdf_bytes(TestPdf::pages(2)), Some(&set), None)
        .unwrap_err();
    assert!(matches!(err, JavelinError::EmptyResult { source_pages: 2 }));
}

#[rstest]
#[case::index_past_end(r#"{"mode":"ordered","pages":[{"index":5}]}"#)]
#[case::page_num_zero(r#"{"mode":"sparse","changes":[{"pageNum":0,"rotation":90}]}"#)]
#[case::page_num_past_end(r#"{"mode":"sparse","changes":[{"pageNum":4,"deleted":true}]}"#)]
#[case::duplicate_page_num(
    r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":90},{"pageNum":1,"deleted":true}]}"#
)]
fn test_invalid_directives(#[case] json: &str) {
    let result = DirectiveSet::from_json(json)
        .and_then(|set| EditPipeline::default().run(&pdf_bytes(TestPdf::pages(3)), Some(&set), None));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidDirective);
}

#[rstest]
#[case::missing_mode(r#"{"pages":[{"index":0}]}"#)]
#[case::unknown_mode(r#"{"mode":"shuffle","pages":[]}"#)]
#[case::unknown_field(r#"{"mode":"ordered","pages":[{"index":0,"flip":true}]}"#)]
#[case::not_json("rotate everything")]
fn test_malformed_directive_payloads(#[case] json: &str) {
    let err = DirectiveSet::from_json(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDirective);
}

#[rstest]
#[case::unknown_type(r#"[{"type":"circle","pageNum":1}]"#)]
#[case::not_a_list(r#"{"type":"text","text":"x"}"#)]
fn test_malformed_layer_payloads(#[case] json: &str) {
    let err = AnnotationLayer::list_from_json(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDirective);
}

#[test]
fn test_editor_extra_fields_tolerated() {
    let layers = AnnotationLayer::list_from_json(
        r#"[{"type":"text","pageNum":1,"text":"x","angle":0,"opacity":1,"fontFamily":"Arial"}]"#,
    )
    .unwrap();
    assert_eq!(layers.len(), 1);
}
