//! Text run extraction for page inspection.
//!
//! Walks a page's decoded content stream with a small text-state machine
//! and reports every shown string as a [`TextSpan`]: its text, bounding box,
//! effective font size, font name, fill color and baseline origin.
//! Positions are in canvas space of the page's visible box (origin
//! top-left, Y down, 1 unit per point), the same space annotation layers
//! are drawn in, so an editor can place a layer exactly over a span.
//!
//! Glyph advances come from the font's `/Widths` array when present and
//! fall back to half an em otherwise. Simple fonts are decoded as Latin-1;
//! composite (`Type0`) fonts are read as two-byte codes with no `ToUnicode`
//! mapping applied.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::analyze::TextAnalyzer;
//! use std::path::Path;
//!
//! # async fn example() -> javelin::Result<()> {
//! let page = TextAnalyzer::new().analyze_file(Path::new("in.pdf"), 1).await?;
//! for span in &page.spans {
//!     println!("{:?} at {:?}", span.text, span.origin);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, instrument};

use crate::edit::pages::page_ids;
use crate::error::{JavelinError, Result};
use crate::geometry::{CanvasTransform, Rgb, page_visible_box};
use crate::io::{PdfReader, read_file};

/// Glyph advance used when a font carries no width for a code, in 1/1000 em.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Ascent and descent of the span box, as fractions of the font size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// One shown string on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Shown text, trimmed.
    pub text: String,
    /// `[x0, y0, x1, y1]` in canvas space, `y0` the top edge.
    pub bbox: [f32; 4],
    /// Font size after the text and current transformation matrices.
    pub size: f32,
    /// Base font name without a subset prefix, or the resource name.
    pub font: String,
    /// Fill color as `#rrggbb`.
    pub color: String,
    /// Start of the baseline in canvas space.
    pub origin: [f32; 2],
}

/// Text spans of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_num: usize,
    /// Pages in the document.
    pub page_count: usize,
    /// Spans in content stream order.
    pub spans: Vec<TextSpan>,
}

/// Extracts positioned text from PDF pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAnalyzer {
    reader: PdfReader,
}

impl TextAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans of page `page_num` (1-based) of the PDF at `path`.
    ///
    /// # Errors
    ///
    /// - input file and load errors
    /// - [`JavelinError::InvalidDirective`] when `page_num` is outside the
    ///   document
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn analyze_file(&self, path: &Path, page_num: usize) -> Result<PageText> {
        let bytes = read_file(path).await?;
        let origin = path.display().to_string();
        let analyzer = *self;

        task::spawn_blocking(move || analyzer.analyze_bytes(&bytes, &origin, page_num)).await?
    }

    /// Spans of page `page_num` of an in-memory PDF.
    ///
    /// # Errors
    ///
    /// As [`analyze_file`](Self::analyze_file), without the file errors.
    pub fn analyze_bytes(&self, bytes: &[u8], origin: &str, page_num: usize) -> Result<PageText> {
        let doc = self.reader.parse(bytes, origin)?;
        analyze_page(&doc, page_num)
    }
}

/// Spans of page `page_num` (1-based) of a loaded document.
///
/// # Errors
///
/// - [`JavelinError::InvalidDirective`] when `page_num` is outside the document
/// - [`JavelinError::InvalidInput`] when the page content cannot be decoded
pub fn analyze_page(doc: &Document, page_num: usize) -> Result<PageText> {
    let pages = page_ids(doc);
    let page_id = page_num
        .checked_sub(1)
        .and_then(|index| pages.get(index).copied())
        .ok_or_else(|| {
            JavelinError::invalid_directive(format!(
                "page {page_num} is out of range for a {}-page document",
                pages.len()
            ))
        })?;

    let content = doc
        .get_and_decode_page_content(page_id)
        .map_err(|e| JavelinError::invalid_input("document", format!("page {page_num} content: {e}")))?;

    let mut scanner = Scanner::new(doc, page_id);
    for operation in &content.operations {
        scanner.apply(operation);
    }

    debug!(page = page_num, spans = scanner.spans.len(), "Analyzed page text");
    Ok(PageText {
        page_num,
        page_count: pages.len(),
        spans: scanner.spans,
    })
}

/// A PDF affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let nums = numbers(operands);
        <[f32; 6]>::try_from(nums.as_slice()).ok().map(Matrix)
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn vertical_scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb,
    font: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: Rgb::BLACK,
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Width table and naming of one font resource.
#[derive(Debug, Clone)]
struct FontInfo {
    name: String,
    composite: bool,
    first_char: i64,
    widths: Vec<f32>,
    default_width: f32,
}

impl FontInfo {
    fn from_dict(resource: &[u8], dict: &Dictionary, doc: &Document) -> Self {
        let name = dict
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|raw| {
                let name = String::from_utf8_lossy(raw).into_owned();
                match name.split_once('+') {
                    Some((prefix, rest)) if prefix.len() == 6 => rest.to_string(),
                    _ => name,
                }
            })
            .unwrap_or_else(|_| String::from_utf8_lossy(resource).into_owned());

        let composite = dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");

        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .map(|arr| numbers(arr))
            .unwrap_or_default();

        let default_width = if composite {
            dict.get(b"DW").and_then(Object::as_float).unwrap_or(1000.0)
        } else {
            DEFAULT_GLYPH_WIDTH
        };

        Self {
            name,
            composite,
            first_char: dict.get(b"FirstChar").and_then(Object::as_i64).unwrap_or(0),
            widths,
            default_width,
        }
    }

    fn fallback(resource: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(resource).into_owned(),
            composite: false,
            first_char: 0,
            widths: Vec::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
        }
    }

    /// Character codes of a shown string.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    fn width(&self, code: u32) -> f32 {
        usize::try_from(i64::from(code) - self.first_char)
            .ok()
            .and_then(|index| self.widths.get(index).copied())
            .unwrap_or(self.default_width)
    }

    fn decode(&self, code: u32) -> char {
        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// Content stream walker collecting spans.
struct Scanner {
    fonts: HashMap<Vec<u8>, FontInfo>,
    canvas: CanvasTransform,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    spans: Vec<TextSpan>,
}

impl Scanner {
    fn new(doc: &Document, page_id: ObjectId) -> Self {
        let fonts = doc
            .get_page_fonts(page_id)
            .map(|fonts| {
                fonts
                    .into_iter()
                    .map(|(name, dict)| {
                        let info = FontInfo::from_dict(&name, dict, doc);
                        (name, info)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            fonts,
            canvas: CanvasTransform::for_page(page_visible_box(doc, page_id)),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            spans: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Operation) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "rg" | "g" | "k" | "sc" | "scn" => {
                if let Some(color) = fill_color(operands) {
                    self.state.fill = color;
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let [name, size] = operands {
                    self.state.font = name.as_name().ok().map(<[u8]>::to_vec);
                    self.state.size = size.as_float().unwrap_or(self.state.size);
                }
            }
            "Tc" => self.state.char_spacing = first_number(operands).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = first_number(operands).unwrap_or(0.0),
            "Tz" => self.state.horizontal_scale = first_number(operands).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = first_number(operands).unwrap_or(0.0),
            "Ts" => self.state.rise = first_number(operands).unwrap_or(0.0),
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.state.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.leading),
            "Tj" => {
                if let Some(text @ Object::String(..)) = operands.first() {
                    self.show(std::slice::from_ref(text));
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.leading);
                if let Some(text) = operands.first() {
                    self.show(std::slice::from_ref(text));
                }
            }
            "\"" => {
                if let [aw, ac, text] = operands {
                    self.state.word_spacing = aw.as_float().unwrap_or(0.0);
                    self.state.char_spacing = ac.as_float().unwrap_or(0.0);
                    self.next_line(0.0, -self.state.leading);
                    self.show(std::slice::from_ref(text));
                }
            }
            "TJ" => {
                if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                    self.show(items);
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Show strings and `TJ` adjustments as one span, advancing the text matrix.
    fn show(&mut self, items: &[Object]) {
        let resource = self.state.font.clone().unwrap_or_default();
        let font = self
            .fonts
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| FontInfo::fallback(&resource));

        let size = self.state.size;
        let scale = self.state.horizontal_scale;
        let start = self.text_matrix;
        let mut text = String::new();
        let mut advance = 0.0f32;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        let glyph = font.width(code) / 1000.0 * size;
                        let mut spacing = self.state.char_spacing;
                        if !font.composite && code == 32 {
                            spacing += self.state.word_spacing;
                        }
                        advance += (glyph + spacing) * scale;
                        text.push(font.decode(code));
                    }
                }
                other => {
                    if let Ok(adjust) = other.as_float() {
                        advance -= adjust / 1000.0 * size * scale;
                    }
                }
            }
        }

        self.text_matrix = Matrix::translate(advance, 0.0).then(&self.text_matrix);

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let device = start.then(&self.state.ctm);
        let rise = self.state.rise;
        let corners = [
            (0.0, rise - DESCENT * size),
            (advance, rise - DESCENT * size),
            (0.0, rise + ASCENT * size),
            (advance, rise + ASCENT * size),
        ]
        .map(|(x, y)| {
            let (px, py) = device.apply(x, y);
            self.canvas.canvas_point(px, py)
        });

        let (x0, x1) = min_max(corners.iter().map(|c| c.0));
        let (y0, y1) = min_max(corners.iter().map(|c| c.1));
        let (ox, oy) = device.apply(0.0, rise);
        let origin = self.canvas.canvas_point(ox, oy);

        self.spans.push(TextSpan {
            text: text.to_string(),
            bbox: [x0, y0, x1, y1],
            size: size * device.vertical_scale(),
            font: font.name.clone(),
            color: hex_color(self.state.fill),
            origin: [origin.0, origin.1],
        });
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(|o| o.as_float().ok()).collect()
}

fn first_number(operands: &[Object]) -> Option<f32> {
    operands.first().and_then(|o| o.as_float().ok())
}

/// Fill color from gray, RGB or CMYK operands. Pattern names are ignored.
fn fill_color(operands: &[Object]) -> Option<Rgb> {
    match numbers(operands)[..] {
        [gray] => Some(Rgb {
            r: gray,
            g: gray,
            b: gray,
        }),
        [r, g, b] => Some(Rgb { r, g, b }),
        [c, m, y, k] => Some(Rgb {
            r: (1.0 - c) * (1.0 - k),
            g: (1.0 - m) * (1.0 - k),
            b: (1.0 - y) * (1.0 - k),
        }),
        _ => None,
    }
}

fn hex_color(color: Rgb) -> String {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(color.r),
        channel(color.g),
        channel(color.b)
    )
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn page_with_content(content: &[u8], font: Dictionary) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(font);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    fn helvetica() -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        }
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_simple_span_position() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET", helvetica());
        let page = analyze_page(&doc, 1).unwrap();

        assert_eq!(page.page_count, 1);
        assert_eq!(page.spans.len(), 1);
        let span = &page.spans[0];
        assert_eq!(span.text, "Hello");
        assert_eq!(span.font, "Helvetica");
        assert_eq!(span.color, "#000000");
        assert_close(&[span.size], &[12.0]);
        assert_close(&span.origin, &[72.0, 72.0]);
        // five glyphs at the half-em fallback width
        assert_close(&span.bbox, &[72.0, 62.4, 102.0, 74.4]);
    }

    #[test]
    fn test_widths_color_and_subset_prefix() {
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Inter-Bold",
            "FirstChar" => 65,
            "Widths" => vec![1000.into(), 250.into()],
        };
        let doc = page_with_content(b"BT 1 0 0 rg /F1 10 Tf 1 0 0 1 100 500 Tm (AB) Tj ET", font);
        let span = &analyze_page(&doc, 1).unwrap().spans[0];

        assert_eq!(span.font, "Inter-Bold");
        assert_eq!(span.color, "#ff0000");
        assert_close(&[span.bbox[0], span.bbox[2]], &[100.0, 112.5]);
        assert_close(&span.origin, &[100.0, 292.0]);
    }

    #[test]
    fn test_cm_scales_size_and_tj_kerning_advances() {
        let doc = page_with_content(
            b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td [(AB) -1000 (C)] TJ (D) Tj ET Q",
            helvetica(),
        );
        let spans = analyze_page(&doc, 1).unwrap().spans;

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "ABC");
        assert_close(&[spans[0].size], &[20.0]);
        // three half-em glyphs plus one em of kerning, doubled by cm
        assert_close(&[spans[0].bbox[0], spans[0].bbox[2]], &[20.0, 70.0]);
        assert_close(&[spans[1].origin[0]], &[70.0]);
    }

    #[test]
    fn test_leading_moves_next_line() {
        let doc = page_with_content(
            b"BT /F1 12 Tf 14 TL 72 720 Td (one) Tj T* (two) Tj ET",
            helvetica(),
        );
        let spans = analyze_page(&doc, 1).unwrap().spans;
        assert_eq!(spans.len(), 2);
        assert_close(&[spans[0].origin[1], spans[1].origin[1]], &[72.0, 86.0]);
    }

    #[test]
    fn test_blank_strings_are_skipped() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 720 Td (   ) Tj ET", helvetica());
        assert!(analyze_page(&doc, 1).unwrap().spans.is_empty());
    }

    #[test]
    fn test_spans_are_relative_to_crop_box() {
        let mut doc = page_with_content(b"BT /F1 12 Tf 72 720 Td (Hi) Tj ET", helvetica());
        let page_id = page_ids(&doc)[0];
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("CropBox", vec![50.into(), 50.into(), 562.into(), 742.into()]);

        let span = &analyze_page(&doc, 1).unwrap().spans[0];
        assert_close(&span.origin, &[22.0, 22.0]);
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = page_with_content(b"", helvetica());
        for page in [0, 2] {
            let err = analyze_page(&doc, page).unwrap_err();
            assert!(matches!(err, JavelinError::InvalidDirective { .. }));
        }
    }

    #[test]
    fn test_analyze_bytes_rejects_non_pdf() {
        let err = TextAnalyzer::new()
            .analyze_bytes(b"hello", "note.txt", 1)
            .unwrap_err();
        assert!(matches!(err, JavelinError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_analyze_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("text.pdf");
        page_with_content(b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET", helvetica())
            .save(&path)
            .unwrap();

        let page = TextAnalyzer::new().analyze_file(&path, 1).await.unwrap();
        assert_eq!(page.page_num, 1);
        assert_eq!(page.spans[0].text, "Hello");
    }
}
