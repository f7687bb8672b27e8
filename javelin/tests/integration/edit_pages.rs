//! Page reorder, rotate and delete through the edit pipeline.

use javelin::ErrorKind;
use javelin::config::CompressionLevel;
use javelin::edit::{DirectiveSet, EditOptions, EditPipeline};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{TestPdf, pages_of, pdf_bytes, write_pdf};

fn pipeline() -> EditPipeline {
    EditPipeline::new(EditOptions {
        compression: CompressionLevel::None,
        ..EditOptions::default()
    })
}

fn edit(source: &[u8], directives: &str) -> Vec<u8> {
    let set = DirectiveSet::from_json(directives).unwrap();
    pipeline().run(source, Some(&set), None).unwrap().bytes
}

#[test]
fn test_sparse_delete_and_rotate() {
    let out = edit(
        &pdf_bytes(TestPdf::pages(4)),
        r#"{"mode":"sparse","changes":[{"pageNum":2,"deleted":true},{"pageNum":4,"rotation":90}]}"#,
    );
    assert_eq!(pages_of(&out), vec![(0, 0), (2, 0), (3, 90)]);
}

#[test]
fn test_ordered_reorder_drops_unmentioned() {
    let out = edit(
        &pdf_bytes(TestPdf::pages(3)),
        r#"{"mode":"ordered","pages":[{"index":2},{"index":0,"rotate":270}]}"#,
    );
    assert_eq!(pages_of(&out), vec![(2, 0), (0, 270)]);
}

#[test]
fn test_duplicate_source_page_rotates_independently() {
    let out = edit(
        &pdf_bytes(TestPdf::pages(1)),
        r#"{"mode":"ordered","pages":[{"index":0,"rotate":90},{"index":0},{"index":0,"rotate":180}]}"#,
    );
    assert_eq!(pages_of(&out), vec![(0, 90), (0, 0), (0, 180)]);
}

#[rstest]
#[case(90, 90)]
#[case(-90, 270)]
#[case(450, 90)]
#[case(360, 0)]
#[case(-180, 180)]
fn test_rotation_normalized(#[case] requested: i64, #[case] expected: i64) {
    let directives =
        format!(r#"{{"mode":"sparse","changes":[{{"pageNum":1,"rotation":{requested}}}]}}"#);
    let out = edit(&pdf_bytes(TestPdf::pages(1)), &directives);
    assert_eq!(pages_of(&out), vec![(0, expected)]);
}

#[rstest]
#[case(45)]
#[case(100)]
#[case(-1)]
fn test_rotation_not_multiple_of_90_rejected(#[case] requested: i64) {
    let directives =
        format!(r#"{{"mode":"sparse","changes":[{{"pageNum":1,"rotation":{requested}}}]}}"#);
    let result = DirectiveSet::from_json(&directives)
        .and_then(|set| pipeline().run(&pdf_bytes(TestPdf::pages(1)), Some(&set), None));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidDirective);
}

#[test]
fn test_two_quarter_turns_equal_half_turn() {
    let source = pdf_bytes(TestPdf::pages(2));
    let quarter = r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":90}]}"#;
    let half = r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":180}]}"#;

    let twice = edit(&edit(&source, quarter), quarter);
    let once = edit(&source, half);
    assert_eq!(pages_of(&twice), pages_of(&once));
    assert_eq!(pages_of(&once), vec![(0, 180), (1, 0)]);
}

#[test]
fn test_delta_adds_to_inherited_rotation() {
    let source = pdf_bytes(TestPdf {
        pages: 2,
        inherited_rotate: Some(90),
        label_base: 0,
    });
    let out = edit(
        &source,
        r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":90}]}"#,
    );
    assert_eq!(pages_of(&out), vec![(0, 180), (1, 90)]);
}

#[test]
fn test_absolute_rotation_replaces_intrinsic() {
    let source = pdf_bytes(TestPdf {
        pages: 1,
        inherited_rotate: Some(270),
        label_base: 0,
    });
    let out = edit(
        &source,
        r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":0,"absolute":true}]}"#,
    );
    assert_eq!(pages_of(&out), vec![(0, 0)]);
}

#[test]
fn test_pass_through_is_idempotent() {
    let source = pdf_bytes(TestPdf {
        pages: 3,
        inherited_rotate: Some(90),
        label_base: 0,
    });
    let first = pipeline().run(&source, None, None).unwrap().bytes;
    let second = pipeline().run(&first, None, None).unwrap().bytes;
    assert_eq!(pages_of(&first), pages_of(&source));
    assert_eq!(pages_of(&second), pages_of(&first));
}

#[test]
fn test_empty_directive_set_passes_through() {
    let source = pdf_bytes(TestPdf::pages(3));
    let out = edit(&source, r#"{"mode":"sparse","changes":[]}"#);
    assert_eq!(pages_of(&out), vec![(0, 0), (1, 0), (2, 0)]);
}

// Output bytes are stable only up to any /Info dates the input carries;
// generated fixtures have none, so the bytes match exactly.
#[test]
fn test_same_request_same_bytes() {
    let source = pdf_bytes(TestPdf::pages(3));
    let directives = r#"{"mode":"ordered","pages":[{"index":1,"rotate":90},{"index":1}]}"#;
    assert_eq!(edit(&source, directives), edit(&source, directives));
}

#[tokio::test]
async fn test_run_to_file() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "in.pdf", TestPdf::pages(3));
    let output = dir.path().join("out.pdf");
    let set = DirectiveSet::from_json(r#"{"mode":"ordered","pages":[{"index":2},{"index":1}]}"#)
        .unwrap();

    let outcome = pipeline()
        .run_to_file(&input, &output, Some(&set), None)
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 2);
    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, outcome.bytes);
    assert_eq!(pages_of(&written), vec![(2, 0), (1, 0)]);
}
