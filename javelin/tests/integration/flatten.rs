//! Annotation layers flattened onto pages.

use javelin::ErrorKind;
use javelin::config::CompressionLevel;
use javelin::edit::{
    AnnotationLayer, CompositeOptions, DiagnosticKind, DirectiveSet, EditOptions, EditPipeline,
};
use javelin::edit::OutOfRangePolicy;
use rstest::rstest;

use crate::common::{TestPdf, contains, page_contents, pages_of, pdf_bytes};

fn pipeline(out_of_range: OutOfRangePolicy) -> EditPipeline {
    EditPipeline::new(EditOptions {
        compression: CompressionLevel::None,
        composite: CompositeOptions {
            out_of_range,
            ..CompositeOptions::default()
        },
    })
}

fn layers(json: &str) -> Vec<AnnotationLayer> {
    AnnotationLayer::list_from_json(json).unwrap()
}

#[test]
fn test_text_layer_lands_on_its_page_only() {
    let source = pdf_bytes(TestPdf::pages(2));
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(
            &source,
            None,
            Some(&layers(r#"[{"type":"text","pageNum":2,"text":"Approved","left":72,"top":72}]"#)),
        )
        .unwrap();

    assert!(outcome.diagnostics.is_empty());
    let contents = page_contents(&outcome.bytes);
    assert!(!contains(&contents[0], b"(Approved) Tj"));
    assert!(contains(&contents[1], b"(Approved) Tj"));
}

#[rstest]
#[case("text")]
#[case("i-text")]
#[case("textbox")]
fn test_text_aliases(#[case] tag: &str) {
    let json = format!(r#"[{{"type":"{tag}","pageNum":1,"text":"Hi"}}]"#);
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(&pdf_bytes(TestPdf::pages(1)), None, Some(&layers(&json)))
        .unwrap();
    assert!(contains(&page_contents(&outcome.bytes)[0], b"(Hi) Tj"));
}

#[test]
fn test_original_content_preserved_under_overlay() {
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(
            &pdf_bytes(TestPdf::pages(1)),
            None,
            Some(&layers(r##"[{"type":"rect","pageNum":1,"fill":"#00ff00"}]"##)),
        )
        .unwrap();

    let content = &page_contents(&outcome.bytes)[0];
    assert!(contains(content, b"10 10 10 20 re"));
    assert!(content.iter().filter(|&&b| b == b'q').count() >= 2);
}

#[test]
fn test_out_of_range_layer_is_diagnosed() {
    let source = pdf_bytes(TestPdf::pages(2));
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(
            &source,
            None,
            Some(&layers(
                r#"[{"type":"text","pageNum":1,"text":"ok"},{"type":"text","pageNum":7,"text":"lost"},{"type":"text","pageNum":0,"text":"lost"}]"#,
            )),
        )
        .unwrap();

    let kinds: Vec<_> = outcome.diagnostics.iter().map(|d| (d.layer_index, d.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (1, DiagnosticKind::PageOutOfRange),
            (2, DiagnosticKind::PageOutOfRange)
        ]
    );
    assert_eq!(outcome.page_count, 2);
    assert!(contains(&page_contents(&outcome.bytes)[0], b"(ok) Tj"));
}

#[test]
fn test_out_of_range_layer_rejected_under_reject_policy() {
    let err = pipeline(OutOfRangePolicy::Reject)
        .run(
            &pdf_bytes(TestPdf::pages(1)),
            None,
            Some(&layers(r#"[{"type":"text","pageNum":3,"text":"x"}]"#)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDirective);
}

#[test]
fn test_bad_layers_do_not_block_good_ones() {
    let json = r##"[
        {"type":"path","pageNum":1,"path":[["M",0,0],["Z",1,2,3]]},
        {"type":"image","pageNum":1,"src":"https://example.com/logo.png"},
        {"type":"rect","pageNum":1,"left":10,"top":10,"fill":"#123"}
    ]"##;
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(&pdf_bytes(TestPdf::pages(1)), None, Some(&layers(json)))
        .unwrap();

    let kinds: Vec<_> = outcome.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![DiagnosticKind::LayerDecodeFailure, DiagnosticKind::RemoteImageRejected]
    );
    assert!(contains(&page_contents(&outcome.bytes)[0], b" re"));
}

#[test]
fn test_path_lines_and_curves_are_drawn() {
    let json = r##"[{"type":"path","pageNum":1,"stroke":"#0000ff","path":[["M",10,10],["L",100,10],["Q",150,50,100,100],["C",80,120,60,120,40,100],["z"]]}]"##;
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(&pdf_bytes(TestPdf::pages(1)), None, Some(&layers(json)))
        .unwrap();

    assert!(outcome.diagnostics.is_empty());
    let content = &page_contents(&outcome.bytes)[0];
    assert!(contains(content, b" m"));
    assert!(contains(content, b" l"));
    assert_eq!(content.windows(2).filter(|w| w == b" c").count(), 2);
    assert!(contains(content, b"\nS"));
}

#[test]
fn test_layers_follow_reordered_pages() {
    let set = DirectiveSet::from_json(r#"{"mode":"ordered","pages":[{"index":1},{"index":0}]}"#)
        .unwrap();
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(
            &pdf_bytes(TestPdf::pages(2)),
            Some(&set),
            Some(&layers(r#"[{"type":"text","pageNum":1,"text":"first"}]"#)),
        )
        .unwrap();

    assert_eq!(pages_of(&outcome.bytes), vec![(1, 0), (0, 0)]);
    let contents = page_contents(&outcome.bytes);
    assert!(contains(&contents[0], b"(first) Tj"));
    assert!(!contains(&contents[1], b"(first) Tj"));
}

#[test]
fn test_duplicated_page_overlays_are_independent() {
    let set = DirectiveSet::from_json(r#"{"mode":"ordered","pages":[{"index":0},{"index":0}]}"#)
        .unwrap();
    let outcome = pipeline(OutOfRangePolicy::Skip)
        .run(
            &pdf_bytes(TestPdf::pages(1)),
            Some(&set),
            Some(&layers(r#"[{"type":"text","pageNum":1,"text":"only once"}]"#)),
        )
        .unwrap();

    let contents = page_contents(&outcome.bytes);
    assert_eq!(contents.len(), 2);
    assert!(contains(&contents[0], b"(only once) Tj"));
    assert!(!contains(&contents[1], b"(only once) Tj"));
}
