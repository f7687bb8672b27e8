//! Text spans read back from pages.

use javelin::ErrorKind;
use javelin::analyze::TextAnalyzer;
use javelin::config::CompressionLevel;
use javelin::edit::{AnnotationLayer, EditOptions, EditPipeline};
use tempfile::TempDir;

use crate::common::{TestPdf, pdf_bytes, write_pdf};

#[test]
fn test_flattened_text_reads_back_at_layer_position() {
    let layers = AnnotationLayer::list_from_json(
        r##"[{"type":"text","pageNum":1,"text":"Approved","left":72,"top":100,"fontSize":24,"fill":"#c00"}]"##,
    )
    .unwrap();
    let outcome = EditPipeline::new(EditOptions {
        compression: CompressionLevel::Standard,
        ..EditOptions::default()
    })
    .run(&pdf_bytes(TestPdf::pages(1)), None, Some(&layers))
    .unwrap();

    let page = TextAnalyzer::new()
        .analyze_bytes(&outcome.bytes, "flattened.pdf", 1)
        .unwrap();

    assert_eq!(page.spans.len(), 1);
    let span = &page.spans[0];
    assert_eq!(span.text, "Approved");
    assert_eq!(span.font, "Helvetica");
    assert_eq!(span.color, "#cc0000");
    assert!((span.size - 24.0).abs() < 1e-3);
    // baseline sits one font size below the layer's top edge
    assert!((span.origin[0] - 72.0).abs() < 1e-3);
    assert!((span.origin[1] - 124.0).abs() < 1e-3);
}

#[test]
fn test_page_without_text_has_no_spans() {
    let page = TextAnalyzer::new()
        .analyze_bytes(&pdf_bytes(TestPdf::pages(2)), "shapes.pdf", 2)
        .unwrap();
    assert_eq!(page.page_count, 2);
    assert!(page.spans.is_empty());
}

#[tokio::test]
async fn test_missing_page_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "in.pdf", TestPdf::pages(2));

    let err = TextAnalyzer::new().analyze_file(&input, 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDirective);
}
