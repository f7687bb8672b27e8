//! Merging documents, then editing and compressing the result.

use javelin::config::CompressionLevel;
use javelin::edit::{DirectiveSet, EditPipeline};
use javelin::io::{PdfWriter, serialize_document};
use javelin::merge::{MergeOptions, Merger};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{TestPdf, build_pdf, pages_of, write_pdf};

fn labelled(pages: usize, label_base: i64) -> TestPdf {
    TestPdf {
        pages,
        inherited_rotate: None,
        label_base,
    }
}

#[tokio::test]
async fn test_merge_keeps_input_order() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", labelled(3, 0));
    let b = write_pdf(dir.path(), "b.pdf", labelled(2, 100));

    let mut result = Merger::new()
        .merge(&[a, b], &MergeOptions::default())
        .await
        .unwrap();
    assert_eq!(result.statistics.total_pages, 5);

    let bytes = serialize_document(&mut result.document, CompressionLevel::None).unwrap();
    let labels: Vec<i64> = pages_of(&bytes).into_iter().map(|(label, _)| label).collect();
    assert_eq!(labels, vec![0, 1, 2, 100, 101]);
}

#[rstest]
#[case(4)]
#[case(6)]
#[tokio::test]
async fn test_merge_many_inputs_in_parallel(#[case] inputs: usize) {
    let dir = TempDir::new().unwrap();
    let paths: Vec<_> = (0..inputs)
        .map(|i| write_pdf(dir.path(), &format!("{i}.pdf"), labelled(1, i as i64 * 10)))
        .collect();

    let options = MergeOptions {
        jobs: Some(2),
        ..MergeOptions::default()
    };
    let mut result = Merger::new().merge(&paths, &options).await.unwrap();

    let bytes = serialize_document(&mut result.document, CompressionLevel::None).unwrap();
    let labels: Vec<i64> = pages_of(&bytes).into_iter().map(|(label, _)| label).collect();
    let expected: Vec<i64> = (0..inputs as i64).map(|i| i * 10).collect();
    assert_eq!(labels, expected);
}

#[tokio::test]
async fn test_merged_output_can_be_edited() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", labelled(2, 0));
    let b = write_pdf(dir.path(), "b.pdf", labelled(1, 50));
    let merged = dir.path().join("merged.pdf");

    let result = Merger::new()
        .merge(&[a, b], &MergeOptions::default())
        .await
        .unwrap();
    PdfWriter::new().save(&result.document, &merged).await.unwrap();

    let set = DirectiveSet::from_json(
        r#"{"mode":"sparse","changes":[{"pageNum":1,"deleted":true},{"pageNum":3,"rotation":90}]}"#,
    )
    .unwrap();
    let outcome = EditPipeline::default()
        .run_file(&merged, Some(&set), None)
        .await
        .unwrap();
    assert_eq!(pages_of(&outcome.bytes), vec![(1, 0), (50, 90)]);
}

#[rstest]
#[case(CompressionLevel::None)]
#[case(CompressionLevel::Standard)]
#[case(CompressionLevel::Maximum)]
fn test_compression_keeps_pages(#[case] level: CompressionLevel) {
    let mut doc = build_pdf(labelled(3, 0));
    let bytes = serialize_document(&mut doc, level).unwrap();
    assert_eq!(pages_of(&bytes), vec![(0, 0), (1, 0), (2, 0)]);
}
