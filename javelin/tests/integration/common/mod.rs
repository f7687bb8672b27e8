//! Shared helpers for integration tests.
//!
//! Test documents are generated with lopdf rather than read from fixtures.
//! Every page carries an integer `/Label` (its 0-based source index) so
//! tests can follow pages through reordering and merging.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use javelin::geometry::page_rotation;
use lopdf::{Document, Object, Stream, dictionary};

/// Options for [`build_pdf`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TestPdf {
    /// Number of pages.
    pub pages: usize,
    /// `/Rotate` stored on the root `/Pages` node, inherited by every page.
    pub inherited_rotate: Option<i64>,
    /// Label offset, so two documents can be told apart after a merge.
    pub label_base: i64,
}

impl TestPdf {
    pub fn pages(pages: usize) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }
}

/// Build a US Letter document as described by `shape`.
pub fn build_pdf(shape: TestPdf) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..shape.pages)
        .map(|i| {
            let content = doc.add_object(Stream::new(
                dictionary! {},
                format!("0 0 1 rg 10 10 {} 20 re f", 10 + i).into_bytes(),
            ));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content,
                "Label" => Object::Integer(shape.label_base + i as i64),
            })
            .into()
        })
        .collect();

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => shape.pages as i64,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    if let Some(rotate) = shape.inherited_rotate {
        pages.set("Rotate", rotate);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);
    doc
}

/// Serialized form of [`build_pdf`].
pub fn pdf_bytes(shape: TestPdf) -> Vec<u8> {
    let mut bytes = Vec::new();
    build_pdf(shape)
        .save_to(&mut bytes)
        .expect("failed to serialize test PDF");
    bytes
}

/// Write a test PDF into `dir`.
pub fn write_pdf(dir: &Path, name: &str, shape: TestPdf) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pdf_bytes(shape)).expect("failed to write test PDF");
    path
}

/// `(label, effective rotation)` for every page, in document order.
pub fn pages_of(bytes: &[u8]) -> Vec<(i64, i64)> {
    let doc = Document::load_mem(bytes).expect("output is not a loadable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let label = doc
                .get_dictionary(id)
                .and_then(|d| d.get(b"Label"))
                .and_then(Object::as_i64)
                .expect("page lost its label");
            (label, page_rotation(&doc, id))
        })
        .collect()
}

/// Decoded content of every page, in document order.
pub fn page_contents(bytes: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(bytes).expect("output is not a loadable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| doc.get_page_content(id).expect("unreadable page content"))
        .collect()
}

/// Whether `haystack` contains `needle`.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Write a solid PNG of the given size into `dir`.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
    let path = dir.join(name);
    img.save(&path).expect("failed to write test PNG");
    path
}
