//! Color parsing and canvas-to-page coordinate mapping.
//!
//! Editors draw annotations on a canvas whose origin is the top-left corner
//! with Y growing downward. PDF page space has its origin at the bottom-left
//! of the visible (crop) box with Y growing upward. [`CanvasTransform`] performs that
//! flip (and an optional scale when the canvas was not rendered at 1pt per
//! pixel) explicitly, so no drawing code ever does ad hoc `height - y` math.

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

/// US Letter, used when a page carries no usable media box.
pub const DEFAULT_MEDIA_BOX: PageBox = PageBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Maximum ancestor depth walked when resolving inherited page attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// An RGB color with channels normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
}

impl Rgb {
    /// Opaque black.
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// White.
    pub const WHITE: Rgb = Rgb {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        }
    }

    /// Channels as a tuple.
    pub fn as_tuple(&self) -> (f32, f32, f32) {
        (self.r, self.g, self.b)
    }
}

/// Parse an editor color string.
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)` and `rgba(r,g,b,a)`.
/// Alpha is ignored. Returns `None` for `transparent`, `none` and empty
/// strings, which callers treat as "do not paint".
///
/// Anything else that cannot be parsed maps to opaque black: a cosmetic
/// defect in one layer must never fail a whole composite.
pub fn parse_color(input: &str) -> Option<Rgb> {
    let s = input.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("transparent") || s.eq_ignore_ascii_case("none") {
        return None;
    }

    Some(parse_functional(s).or_else(|| parse_hex(s)).unwrap_or(Rgb::BLACK))
}

/// Parse a color that must be painted, falling back to black.
pub fn parse_color_or_black(input: Option<&str>) -> Rgb {
    input.and_then(parse_color).unwrap_or(Rgb::BLACK)
}

fn parse_hex(s: &str) -> Option<Rgb> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |from: usize| u8::from_str_radix(&hex[from..from + 2], 16).ok();

    match hex.len() {
        3 => {
            let mut expanded = String::with_capacity(6);
            for c in hex.chars() {
                expanded.push(c);
                expanded.push(c);
            }
            parse_hex(&expanded)
        }
        6 | 8 => Some(Rgb::from_bytes(channel(0)?, channel(2)?, channel(4)?)),
        _ => None,
    }
}

fn parse_functional(s: &str) -> Option<Rgb> {
    let lower = s.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba")
        .or_else(|| lower.strip_prefix("rgb"))?
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return None;
    }

    let channel = |part: &str| -> Option<u8> {
        let value: f32 = part.trim_end_matches('%').parse().ok()?;
        let value = if part.ends_with('%') {
            value * 255.0 / 100.0
        } else {
            value
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    };

    Some(Rgb::from_bytes(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
    ))
}

/// A rectangle in PDF user space (`x0,y0` bottom-left, `x1,y1` top-right).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Left edge.
    pub x0: f32,
    /// Bottom edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
}

impl PageBox {
    /// Build a normalized box from a PDF rectangle array.
    pub fn from_array(values: &[Object]) -> Option<Self> {
        if values.len() != 4 {
            return None;
        }
        let mut nums = [0.0f32; 4];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = value.as_float().ok()?;
        }
        Some(Self {
            x0: nums[0].min(nums[2]),
            y0: nums[1].min(nums[3]),
            x1: nums[0].max(nums[2]),
            y1: nums[1].max(nums[3]),
        })
    }

    /// Width in points.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height in points.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Overlap of two boxes, `None` when they do not overlap.
    pub fn intersect(&self, other: &PageBox) -> Option<PageBox> {
        let clipped = PageBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (clipped.width() > 0.0 && clipped.height() > 0.0).then_some(clipped)
    }
}

/// Size of the editor canvas a layer list was drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Canvas width in canvas units.
    pub width: f32,
    /// Canvas height in canvas units.
    pub height: f32,
}

/// Maps canvas coordinates (top-left origin) into a page's PDF space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    page: PageBox,
    scale_x: f32,
    scale_y: f32,
}

impl CanvasTransform {
    /// Transform for a page whose canvas was rendered at 1 unit per point.
    pub fn for_page(page: PageBox) -> Self {
        Self {
            page,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Transform for a page rendered onto a canvas of the given size.
    ///
    /// Degenerate canvas dimensions fall back to a unit scale on that axis.
    pub fn with_canvas(page: PageBox, canvas: CanvasSize) -> Self {
        let ratio = |page_len: f32, canvas_len: f32| {
            if canvas_len.is_finite() && canvas_len > 0.0 {
                page_len / canvas_len
            } else {
                1.0
            }
        };
        Self {
            page,
            scale_x: ratio(page.width(), canvas.width),
            scale_y: ratio(page.height(), canvas.height),
        }
    }

    /// The target page box.
    pub fn page(&self) -> PageBox {
        self.page
    }

    /// Horizontal canvas-to-point factor.
    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    /// Vertical canvas-to-point factor.
    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// Map a canvas point to page space.
    pub fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.page.x0 + x * self.scale_x,
            self.page.y1 - y * self.scale_y,
        )
    }

    /// Map a page-space point back to canvas coordinates.
    pub fn canvas_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.page.x0) / self.scale_x,
            (self.page.y1 - y) / self.scale_y,
        )
    }

    /// Map a canvas length along X to points.
    pub fn len_x(&self, len: f32) -> f32 {
        len * self.scale_x
    }

    /// Map a canvas length along Y to points.
    pub fn len_y(&self, len: f32) -> f32 {
        len * self.scale_y
    }

    /// Map a top-left-anchored canvas box to a PDF rectangle `(x, y, w, h)`
    /// whose `(x, y)` is the bottom-left corner.
    pub fn rect(&self, left: f32, top: f32, width: f32, height: f32) -> (f32, f32, f32, f32) {
        let (x, y_top) = self.point(left, top);
        let w = self.len_x(width);
        let h = self.len_y(height);
        (x, y_top - h, w, h)
    }
}

/// Resolve a page attribute, walking up `/Parent` links for inheritable keys.
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = current.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Media box of a page, falling back to US Letter.
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| PageBox::from_array(arr))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The region of a page a viewer shows: the crop box clipped to the media
/// box. Pages without a usable crop box show their whole media box.
pub fn page_visible_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let media = page_media_box(doc, page_id);
    inherited_attribute(doc, page_id, b"CropBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| PageBox::from_array(arr))
        .and_then(|crop| crop.intersect(&media))
        .unwrap_or(media)
}

/// Intrinsic rotation of a page, normalized into `0..360`.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_parse_long_hex() {
        let c = parse_color("#FF0000").unwrap();
        assert_eq!(c.as_tuple(), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_short_hex() {
        let c = parse_color("#0f0").unwrap();
        assert_eq!(c.as_tuple(), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_parse_rgba_ignores_alpha() {
        let c = parse_color("rgba(255,0,0,0.5)").unwrap();
        assert_eq!(c.as_tuple(), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_rgb_with_spaces() {
        let c = parse_color("rgb( 0, 0 , 255 )").unwrap();
        assert_eq!(c.as_tuple(), (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_transparent_is_none() {
        assert!(parse_color("transparent").is_none());
        assert!(parse_color("").is_none());
    }

    #[test]
    fn test_malformed_maps_to_black() {
        assert_eq!(parse_color("#zzz"), Some(Rgb::BLACK));
        assert_eq!(parse_color("rgba(1,2)"), Some(Rgb::BLACK));
        assert_eq!(parse_color("chartreuse"), Some(Rgb::BLACK));
        assert_eq!(parse_color_or_black(None), Rgb::BLACK);
    }

    #[test]
    fn test_point_flips_y() {
        let t = CanvasTransform::for_page(DEFAULT_MEDIA_BOX);
        assert_eq!(t.point(100.0, 124.0), (100.0, 668.0));
    }

    #[test]
    fn test_point_respects_box_origin() {
        let page = PageBox {
            x0: 10.0,
            y0: 20.0,
            x1: 110.0,
            y1: 220.0,
        };
        let t = CanvasTransform::for_page(page);
        assert_eq!(t.point(0.0, 0.0), (10.0, 220.0));
        assert_eq!(t.point(100.0, 200.0), (110.0, 20.0));
    }

    #[test]
    fn test_canvas_scale() {
        let canvas = CanvasSize {
            width: 1224.0,
            height: 1584.0,
        };
        let t = CanvasTransform::with_canvas(DEFAULT_MEDIA_BOX, canvas);
        assert!(approx(t.scale_x(), 0.5));
        assert!(approx(t.scale_y(), 0.5));
        let (x, y) = t.point(200.0, 200.0);
        assert!(approx(x, 100.0));
        assert!(approx(y, 692.0));
    }

    #[test]
    fn test_degenerate_canvas_uses_unit_scale() {
        let canvas = CanvasSize {
            width: 0.0,
            height: f32::NAN,
        };
        let t = CanvasTransform::with_canvas(DEFAULT_MEDIA_BOX, canvas);
        assert_eq!(t.scale_x(), 1.0);
        assert_eq!(t.scale_y(), 1.0);
    }

    #[test]
    fn test_canvas_point_inverts_point() {
        let canvas = CanvasSize {
            width: 1224.0,
            height: 1584.0,
        };
        let t = CanvasTransform::with_canvas(DEFAULT_MEDIA_BOX, canvas);
        let (x, y) = t.point(300.0, 400.0);
        let (cx, cy) = t.canvas_point(x, y);
        assert!(approx(cx, 300.0));
        assert!(approx(cy, 400.0));
    }

    #[test]
    fn test_rect_is_bottom_left_anchored() {
        let t = CanvasTransform::for_page(DEFAULT_MEDIA_BOX);
        assert_eq!(t.rect(50.0, 100.0, 200.0, 40.0), (50.0, 652.0, 200.0, 40.0));
    }

    #[test]
    fn test_page_box_normalizes_corners() {
        let arr: Vec<Object> = vec![612.into(), 792.into(), 0.into(), 0.into()];
        let b = PageBox::from_array(&arr).unwrap();
        assert_eq!(b, DEFAULT_MEDIA_BOX);
        assert!(PageBox::from_array(&arr[..3]).is_none());
    }

    #[test]
    fn test_inherited_media_box_and_rotation() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Rotate" => -90,
            }
            .into(),
        );

        let media = page_media_box(&doc, page_id);
        assert_eq!(media.width(), 595.0);
        assert_eq!(media.height(), 842.0);
        assert_eq!(page_rotation(&doc, page_id), 270);
        assert_eq!(page_visible_box(&doc, page_id), media);
    }

    fn page_with_boxes(media: Vec<Object>, crop: Vec<Object>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media,
            "CropBox" => crop,
        });
        (doc, page_id)
    }

    #[test]
    fn test_visible_box_is_crop_box() {
        let (doc, page_id) = page_with_boxes(
            vec![0.into(), 0.into(), 612.into(), 792.into()],
            vec![50.into(), 50.into(), 562.into(), 742.into()],
        );
        let visible = page_visible_box(&doc, page_id);
        assert_eq!((visible.x0, visible.y0, visible.x1, visible.y1), (50.0, 50.0, 562.0, 742.0));

        let t = CanvasTransform::for_page(visible);
        assert_eq!(t.rect(0.0, 0.0, 10.0, 10.0), (50.0, 732.0, 10.0, 10.0));
    }

    #[test]
    fn test_visible_box_clips_to_media_box() {
        let (doc, page_id) = page_with_boxes(
            vec![0.into(), 0.into(), 300.into(), 400.into()],
            vec![(-20).into(), 100.into(), 500.into(), 900.into()],
        );
        let visible = page_visible_box(&doc, page_id);
        assert_eq!((visible.x0, visible.y0, visible.x1, visible.y1), (0.0, 100.0, 300.0, 400.0));
    }

    #[test]
    fn test_disjoint_crop_box_falls_back_to_media_box() {
        let (doc, page_id) = page_with_boxes(
            vec![0.into(), 0.into(), 300.into(), 400.into()],
            vec![500.into(), 500.into(), 600.into(), 600.into()],
        );
        assert_eq!(page_visible_box(&doc, page_id), page_media_box(&doc, page_id));
    }
}
