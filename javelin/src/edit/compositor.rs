//! Layer compositing.
//!
//! Layers are drawn into one overlay content stream per page. The page's own
//! content is bracketed with `q`/`Q` first so whatever graphics state it
//! leaves behind (a stray `cm`, a clip, a fill color) cannot leak into the
//! overlay, and every layer is drawn in its own `q`/`Q` pair.
//!
//! Shared objects are never modified in place: the overlay adds new content
//! streams and page resources are copied onto the page before new entries
//! are registered. Pages emitted twice by restructuring therefore stay
//! independent.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, instrument, warn};

use crate::edit::layers::{AnnotationLayer, ImageLayer, PathCommand, PathLayer, RectLayer, TextLayer};
use crate::edit::pages::page_ids;
use crate::edit::{Diagnostic, DiagnosticKind, OutOfRangePolicy};
use crate::error::{JavelinError, Result};
use crate::geometry::{CanvasSize, CanvasTransform, Rgb, page_visible_box, parse_color, parse_color_or_black};

/// Resource name of the overlay font.
const FONT_RESOURCE: &str = "JvHelv";

/// Prefix of overlay image resource names.
const IMAGE_RESOURCE_PREFIX: &str = "JvImg";

/// Line advance as a multiple of the font size for multi-line text.
const LINE_HEIGHT: f32 = 1.2;

/// Options for [`Compositor`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompositeOptions {
    /// Canvas size the layers were drawn on; `None` means 1 unit per point.
    pub canvas: Option<CanvasSize>,
    /// Handling of layers that target missing pages.
    pub out_of_range: OutOfRangePolicy,
}

/// Draws annotation layers onto document pages.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    options: CompositeOptions,
}

/// Why one layer was not drawn.
struct LayerIssue {
    kind: DiagnosticKind,
    message: String,
}

impl LayerIssue {
    fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

type Drawn = std::result::Result<(), LayerIssue>;

/// Overlay being accumulated for one page.
struct PageOverlay {
    transform: CanvasTransform,
    ops: Vec<Operation>,
    uses_font: bool,
    images: Vec<(String, ObjectId)>,
}

impl Compositor {
    /// Create a compositor with the given options.
    pub fn new(options: CompositeOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &CompositeOptions {
        &self.options
    }

    /// Draw `layers` onto `doc`.
    ///
    /// Layers are grouped by target page and drawn in request order within
    /// each page. A layer that cannot be drawn produces a [`Diagnostic`] and
    /// never stops the others.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::InvalidDirective`] when a layer targets a missing
    ///   page and the policy is [`OutOfRangePolicy::Reject`]
    /// - [`JavelinError::SerializationFailure`] when an overlay stream cannot
    ///   be encoded
    #[instrument(skip_all, fields(layers = layers.len()))]
    pub fn composite(&self, doc: &mut Document, layers: &[AnnotationLayer]) -> Result<Vec<Diagnostic>> {
        let pages = page_ids(doc);
        let mut diagnostics = Vec::new();
        let mut by_page: BTreeMap<usize, Vec<(usize, &AnnotationLayer)>> = BTreeMap::new();

        for (layer_index, layer) in layers.iter().enumerate() {
            let page_num = layer.page_num();
            match usize::try_from(page_num) {
                Ok(n) if (1..=pages.len()).contains(&n) => {
                    by_page.entry(n - 1).or_default().push((layer_index, layer));
                }
                _ => {
                    let message = format!(
                        "{} layer targets page {page_num} but the document has {} page(s)",
                        layer.kind_name(),
                        pages.len()
                    );
                    if self.options.out_of_range == OutOfRangePolicy::Reject {
                        return Err(JavelinError::invalid_directive(message));
                    }
                    warn!(layer_index, page_num, "Skipping layer for missing page");
                    diagnostics.push(Diagnostic {
                        layer_index,
                        page_num,
                        kind: DiagnosticKind::PageOutOfRange,
                        message,
                    });
                }
            }
        }

        let mut font_id = None;

        for (page_index, page_layers) in by_page {
            let page_id = pages[page_index];
            let visible = page_visible_box(doc, page_id);
            let transform = match self.options.canvas {
                Some(canvas) => CanvasTransform::with_canvas(visible, canvas),
                None => CanvasTransform::for_page(visible),
            };

            let mut overlay = PageOverlay {
                transform,
                ops: Vec::new(),
                uses_font: false,
                images: Vec::new(),
            };

            for (layer_index, layer) in page_layers {
                let drawn = match layer {
                    AnnotationLayer::Text(l) => draw_text(&mut overlay, l),
                    AnnotationLayer::Path(l) => draw_path(&mut overlay, l),
                    AnnotationLayer::Rect(l) => draw_rect(&mut overlay, l),
                    AnnotationLayer::Image(l) => draw_image(doc, &mut overlay, l),
                };
                if let Err(issue) = drawn {
                    debug!(layer_index, kind = issue.kind.as_str(), "Layer not drawn");
                    diagnostics.push(Diagnostic {
                        layer_index,
                        page_num: layer.page_num(),
                        kind: issue.kind,
                        message: issue.message,
                    });
                }
            }

            if overlay.ops.is_empty() {
                continue;
            }

            let font = if overlay.uses_font {
                Some(*font_id.get_or_insert_with(|| doc.add_object(helvetica())))
            } else {
                None
            };
            register_resources(doc, page_id, font, &overlay.images)?;

            let encoded = Content {
                operations: overlay.ops,
            }
            .encode()
            .map_err(|e| JavelinError::serialization(format!("overlay content: {e}")))?;
            append_overlay(doc, page_id, encoded)?;

            debug!(page = page_index + 1, "Composited overlay");
        }

        Ok(diagnostics)
    }
}

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn fill_color(color: Rgb) -> Operation {
    op("rg", vec![color.r.into(), color.g.into(), color.b.into()])
}

fn stroke_color(color: Rgb) -> Operation {
    op("RG", vec![color.r.into(), color.g.into(), color.b.into()])
}

/// Encode text for a WinAnsi Type1 font. Anything outside printable
/// Latin-1 becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn draw_text(overlay: &mut PageOverlay, layer: &TextLayer) -> Drawn {
    if layer.text.trim().is_empty() {
        return Err(LayerIssue::new(DiagnosticKind::EmptyLayer, "text layer has no text"));
    }

    let t = overlay.transform;
    let canvas_size = layer.font_size * layer.scale_y;
    let size = t.len_y(canvas_size);
    if !(size.is_finite() && size > 0.0) {
        return Err(LayerIssue::new(
            DiagnosticKind::LayerDecodeFailure,
            format!("invalid font size {}", layer.font_size),
        ));
    }

    let (x, y) = t.point(layer.left, layer.top + canvas_size);
    let color = parse_color_or_black(layer.fill.as_deref());
    let stretch = (layer.scale_x * t.scale_x()) / (layer.scale_y * t.scale_y()) * 100.0;

    let ops = &mut overlay.ops;
    ops.push(op("q", vec![]));
    ops.push(fill_color(color));
    ops.push(op("BT", vec![]));
    ops.push(op("Tf", vec![FONT_RESOURCE.into(), size.into()]));
    if stretch.is_finite() && (stretch - 100.0).abs() > 0.01 {
        ops.push(op("Tz", vec![stretch.into()]));
    }
    ops.push(op("TL", vec![(size * LINE_HEIGHT).into()]));
    ops.push(op("Td", vec![x.into(), y.into()]));
    for (i, line) in layer.text.lines().enumerate() {
        if i > 0 {
            ops.push(op("T*", vec![]));
        }
        ops.push(op("Tj", vec![Object::String(win_ansi(line), StringFormat::Literal)]));
    }
    ops.push(op("ET", vec![]));
    ops.push(op("Q", vec![]));

    overlay.uses_font = true;
    Ok(())
}

fn draw_rect(overlay: &mut PageOverlay, layer: &RectLayer) -> Drawn {
    let t = overlay.transform;
    let (x, y, w, h) = t.rect(
        layer.left,
        layer.top,
        layer.width * layer.scale_x,
        layer.height * layer.scale_y,
    );

    let fill = layer.fill.as_deref().and_then(parse_color);
    let stroke = layer
        .stroke
        .as_deref()
        .and_then(parse_color)
        .filter(|_| layer.stroke_width > 0.0);

    let paint = match (fill.is_some(), stroke.is_some()) {
        (true, true) => "B",
        (true, false) => "f",
        (false, true) => "S",
        (false, false) => {
            return Err(LayerIssue::new(
                DiagnosticKind::EmptyLayer,
                "rect has neither fill nor stroke",
            ));
        }
    };

    let ops = &mut overlay.ops;
    ops.push(op("q", vec![]));
    if let Some(color) = fill {
        ops.push(fill_color(color));
    }
    if let Some(color) = stroke {
        ops.push(stroke_color(color));
        ops.push(op("w", vec![t.len_x(layer.stroke_width).into()]));
    }
    ops.push(op("re", vec![x.into(), y.into(), w.into(), h.into()]));
    ops.push(op(paint, vec![]));
    ops.push(op("Q", vec![]));
    Ok(())
}

fn draw_path(overlay: &mut PageOverlay, layer: &PathLayer) -> Drawn {
    let commands = layer
        .commands()
        .map_err(|e| LayerIssue::new(DiagnosticKind::LayerDecodeFailure, e))?;
    if commands.is_empty() {
        return Err(LayerIssue::new(DiagnosticKind::EmptyLayer, "path has no commands"));
    }

    let t = overlay.transform;
    let point = |x: f32, y: f32| -> Vec<Object> {
        let (px, py) = t.point(x, y);
        vec![px.into(), py.into()]
    };

    let at = |current: Option<(f32, f32)>| {
        current.ok_or_else(|| {
            LayerIssue::new(
                DiagnosticKind::LayerDecodeFailure,
                "path segment before the first M command",
            )
        })
    };

    let mut segments = Vec::with_capacity(commands.len());
    // Current point and subpath start, in canvas space.
    let mut current: Option<(f32, f32)> = None;
    let mut start = (0.0, 0.0);

    for command in commands {
        match command {
            PathCommand::MoveTo(x, y) => {
                segments.push(op("m", point(x, y)));
                current = Some((x, y));
                start = (x, y);
            }
            PathCommand::LineTo(x, y) => {
                at(current)?;
                segments.push(op("l", point(x, y)));
                current = Some((x, y));
            }
            PathCommand::Horizontal(x) => {
                let (_, y) = at(current)?;
                segments.push(op("l", point(x, y)));
                current = Some((x, y));
            }
            PathCommand::Vertical(y) => {
                let (x, _) = at(current)?;
                segments.push(op("l", point(x, y)));
                current = Some((x, y));
            }
            PathCommand::Quad(cx, cy, x, y) => {
                let (x0, y0) = at(current)?;
                // Degree elevation: the cubic with these controls traces the same curve.
                let c1 = (x0 + 2.0 / 3.0 * (cx - x0), y0 + 2.0 / 3.0 * (cy - y0));
                let c2 = (x + 2.0 / 3.0 * (cx - x), y + 2.0 / 3.0 * (cy - y));
                let mut operands = point(c1.0, c1.1);
                operands.extend(point(c2.0, c2.1));
                operands.extend(point(x, y));
                segments.push(op("c", operands));
                current = Some((x, y));
            }
            PathCommand::Cubic(c1x, c1y, c2x, c2y, x, y) => {
                at(current)?;
                let mut operands = point(c1x, c1y);
                operands.extend(point(c2x, c2y));
                operands.extend(point(x, y));
                segments.push(op("c", operands));
                current = Some((x, y));
            }
            PathCommand::Close => {
                at(current)?;
                segments.push(op("h", vec![]));
                current = Some(start);
            }
        }
    }

    let color = parse_color_or_black(layer.stroke.as_deref());
    let ops = &mut overlay.ops;
    ops.push(op("q", vec![]));
    ops.push(stroke_color(color));
    ops.push(op("w", vec![t.len_x(layer.stroke_width).into()]));
    ops.push(op("J", vec![1.into()]));
    ops.push(op("j", vec![1.into()]));
    ops.extend(segments);
    ops.push(op("S", vec![]));
    ops.push(op("Q", vec![]));
    Ok(())
}

fn draw_image(doc: &mut Document, overlay: &mut PageOverlay, layer: &ImageLayer) -> Drawn {
    let src = layer.src.trim();
    if src.is_empty() {
        return Err(LayerIssue::new(DiagnosticKind::EmptyLayer, "image layer has no source"));
    }

    let lower = src.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Err(LayerIssue::new(
            DiagnosticKind::RemoteImageRejected,
            "remote image sources are not fetched",
        ));
    }

    let bytes = decode_data_uri(src)
        .map_err(|e| LayerIssue::new(DiagnosticKind::LayerDecodeFailure, e))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| LayerIssue::new(DiagnosticKind::LayerDecodeFailure, format!("image: {e}")))?
        .to_rgba8();

    let image_id = add_image_xobject(doc, &image);
    let name = format!("{IMAGE_RESOURCE_PREFIX}{}", overlay.images.len() + 1);
    overlay.images.push((name.clone(), image_id));

    let (x, y, w, h) = overlay.transform.rect(
        layer.left,
        layer.top,
        layer.width * layer.scale_x,
        layer.height * layer.scale_y,
    );

    let ops = &mut overlay.ops;
    ops.push(op("q", vec![]));
    ops.push(op(
        "cm",
        vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()],
    ));
    ops.push(op("Do", vec![Object::Name(name.into_bytes())]));
    ops.push(op("Q", vec![]));
    Ok(())
}

/// Payload of a `data:image/...;base64,` URI.
fn decode_data_uri(src: &str) -> std::result::Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or("unsupported image source; expected a data URI")?;
    let (header, payload) = rest.split_once(',').ok_or("data URI has no payload")?;
    if !header.ends_with(";base64") {
        return Err("data URI is not base64 encoded".to_string());
    }
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    B64.decode(compact.as_bytes())
        .map_err(|e| format!("base64: {e}"))
}

/// Add an RGB image XObject, with a grayscale soft mask when any pixel is
/// not fully opaque.
fn add_image_xobject(doc: &mut Document, image: &image::RgbaImage) -> ObjectId {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if alpha.iter().any(|&a| a != u8::MAX) {
        let smask = compressed_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        dict.set("SMask", doc.add_object(smask));
    }

    doc.add_object(compressed_stream(dict, rgb))
}

fn compressed_stream(dict: Dictionary, data: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, data);
    if let Err(e) = stream.compress() {
        debug!(error = %e, "Leaving image stream uncompressed");
    }
    stream
}

/// Copy the page's effective resources onto the page and register the
/// overlay font and images in the copy.
fn register_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font: Option<ObjectId>,
    images: &[(String, ObjectId)],
) -> Result<()> {
    let mut resources = match crate::geometry::inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    if let Some(font_id) = font {
        let mut fonts = sub_dictionary(doc, &resources, b"Font");
        fonts.set(FONT_RESOURCE, font_id);
        resources.set("Font", fonts);
    }

    if !images.is_empty() {
        let mut xobjects = sub_dictionary(doc, &resources, b"XObject");
        for (name, id) in images {
            xobjects.set(name.as_str(), *id);
        }
        resources.set("XObject", xobjects);
    }

    page_dict_mut(doc, page_id)?.set("Resources", resources);
    Ok(())
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    match resources.get(key) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Bracket the existing content in `q`/`Q` and append the overlay after it.
fn append_overlay(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let mut tail = b"Q\n".to_vec();
    tail.extend(overlay);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), tail));

    let page = page_dict_mut(doc, page_id)?;
    let mut contents = vec![Object::Reference(open_id)];
    match page.get(b"Contents").ok().cloned() {
        Some(Object::Reference(id)) => contents.push(Object::Reference(id)),
        Some(Object::Array(existing)) => contents.extend(existing),
        _ => {}
    }
    contents.push(Object::Reference(overlay_id));
    page.set("Contents", contents);
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| JavelinError::invalid_input("document", format!("bad page object: {e}")))
}
