//! Image to PDF conversion.

use javelin::convert::ImageConverter;
use javelin::geometry::page_media_box;
use tempfile::TempDir;

use crate::common::write_png;

#[tokio::test]
async fn test_two_images_two_pages_sized_at_100_dpi() {
    let dir = TempDir::new().unwrap();
    let images = vec![
        write_png(dir.path(), "wide.png", 300, 100),
        write_png(dir.path(), "tall.png", 100, 500),
    ];

    let doc = ImageConverter::new().convert(&images).await.unwrap();
    let sizes: Vec<(f32, f32)> = doc
        .get_pages()
        .into_values()
        .map(|id| {
            let media = page_media_box(&doc, id);
            (media.width(), media.height())
        })
        .collect();
    assert_eq!(sizes, vec![(216.0, 72.0), (72.0, 360.0)]);
}

#[tokio::test]
async fn test_separate_outputs_one_page_each() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let images = vec![
        write_png(dir.path(), "scan.png", 40, 40),
        write_png(dir.path(), "other.png", 40, 40),
    ];

    let outputs = ImageConverter::new()
        .convert_separately(&images, out.path())
        .await
        .unwrap();
    assert_eq!(outputs.len(), 2);
    for path in outputs {
        let doc = javelin::io::load_pdf(&path).await.unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
