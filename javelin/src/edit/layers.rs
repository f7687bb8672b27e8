//! Annotation layer payloads as sent by canvas editors.
//!
//! Layers are deserialized leniently: editors attach plenty of fields we do
//! not draw (`angle`, `opacity`, `selectable`, ...) and those are ignored. The
//! `type` tag is strict, an unknown primitive rejects the whole payload.
//!
//! Path geometry is kept as raw JSON and decoded at draw time so a single
//! malformed path becomes a per-layer diagnostic instead of a request error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

fn default_page() -> i64 {
    1
}

fn one() -> f32 {
    1.0
}

fn default_font_size() -> f32 {
    12.0
}

fn default_path_width() -> f32 {
    2.0
}

fn default_rect_side() -> f32 {
    50.0
}

fn default_rect_stroke() -> Option<String> {
    Some("#000000".to_string())
}

fn default_image_side() -> f32 {
    100.0
}

/// A single drawing primitive targeting one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnnotationLayer {
    /// A run of text.
    #[serde(rename = "text", alias = "i-text", alias = "textbox")]
    Text(TextLayer),
    /// A freehand or vector path.
    #[serde(rename = "path")]
    Path(PathLayer),
    /// An axis-aligned rectangle.
    #[serde(rename = "rect")]
    Rect(RectLayer),
    /// A raster image.
    #[serde(rename = "image")]
    Image(ImageLayer),
}

impl AnnotationLayer {
    /// 1-based target page number.
    pub fn page_num(&self) -> i64 {
        match self {
            Self::Text(l) => l.page_num,
            Self::Path(l) => l.page_num,
            Self::Rect(l) => l.page_num,
            Self::Image(l) => l.page_num,
        }
    }

    /// Primitive name, used in logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::Rect(_) => "rect",
            Self::Image(_) => "image",
        }
    }

    /// Parse a JSON array of layers.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::InvalidDirective`](crate::JavelinError::InvalidDirective)
    /// for malformed JSON or an unknown layer `type`.
    pub fn list_from_json(json: &str) -> Result<Vec<AnnotationLayer>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Text drawn in Helvetica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// 1-based target page.
    #[serde(default = "default_page")]
    pub page_num: i64,
    /// The text itself.
    #[serde(default)]
    pub text: String,
    /// Canvas X of the left edge.
    #[serde(default)]
    pub left: f32,
    /// Canvas Y of the top edge.
    #[serde(default)]
    pub top: f32,
    /// Nominal font size before scaling.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Horizontal editor scale.
    #[serde(default = "one")]
    pub scale_x: f32,
    /// Vertical editor scale; multiplies the font size.
    #[serde(default = "one")]
    pub scale_y: f32,
    /// Text color.
    #[serde(default)]
    pub fill: Option<String>,
}

/// A stroked path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathLayer {
    /// 1-based target page.
    #[serde(default = "default_page")]
    pub page_num: i64,
    /// Raw commands, e.g. `[["M", 10, 10], ["L", 20, 20]]`.
    #[serde(default)]
    pub path: Vec<Value>,
    /// Stroke color.
    #[serde(default)]
    pub stroke: Option<String>,
    /// Stroke width in canvas units.
    #[serde(default = "default_path_width")]
    pub stroke_width: f32,
}

impl PathLayer {
    /// Decode the raw path commands.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed command.
    pub fn commands(&self) -> std::result::Result<Vec<PathCommand>, String> {
        self.path
            .iter()
            .enumerate()
            .map(|(i, raw)| PathCommand::from_value(raw).map_err(|e| format!("command {i}: {e}")))
            .collect()
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectLayer {
    /// 1-based target page.
    #[serde(default = "default_page")]
    pub page_num: i64,
    /// Canvas X of the left edge.
    #[serde(default)]
    pub left: f32,
    /// Canvas Y of the top edge.
    #[serde(default)]
    pub top: f32,
    /// Unscaled width.
    #[serde(default = "default_rect_side")]
    pub width: f32,
    /// Unscaled height.
    #[serde(default = "default_rect_side")]
    pub height: f32,
    /// Horizontal editor scale.
    #[serde(default = "one")]
    pub scale_x: f32,
    /// Vertical editor scale.
    #[serde(default = "one")]
    pub scale_y: f32,
    /// Fill color; absent or `transparent` leaves the interior unpainted.
    #[serde(default)]
    pub fill: Option<String>,
    /// Outline color.
    #[serde(default = "default_rect_stroke")]
    pub stroke: Option<String>,
    /// Outline width in canvas units.
    #[serde(default = "one")]
    pub stroke_width: f32,
}

/// An embedded raster image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    /// 1-based target page.
    #[serde(default = "default_page")]
    pub page_num: i64,
    /// Canvas X of the left edge.
    #[serde(default)]
    pub left: f32,
    /// Canvas Y of the top edge.
    #[serde(default)]
    pub top: f32,
    /// Unscaled width.
    #[serde(default = "default_image_side")]
    pub width: f32,
    /// Unscaled height.
    #[serde(default = "default_image_side")]
    pub height: f32,
    /// Horizontal editor scale.
    #[serde(default = "one")]
    pub scale_x: f32,
    /// Vertical editor scale.
    #[serde(default = "one")]
    pub scale_y: f32,
    /// Image source, a `data:image/...;base64,` URI.
    #[serde(default)]
    pub src: String,
}

/// One absolute path command in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// `M x y`
    MoveTo(f32, f32),
    /// `L x y`
    LineTo(f32, f32),
    /// `H x`
    Horizontal(f32),
    /// `V y`
    Vertical(f32),
    /// `Q cx cy x y`
    Quad(f32, f32, f32, f32),
    /// `C c1x c1y c2x c2y x y`
    Cubic(f32, f32, f32, f32, f32, f32),
    /// `Z`
    Close,
}

impl PathCommand {
    /// Decode one `["OP", n, n, ...]` array.
    pub fn from_value(raw: &Value) -> std::result::Result<Self, String> {
        let items = raw.as_array().ok_or("expected an array")?;
        let (op, args) = items.split_first().ok_or("empty command")?;
        let op = op.as_str().ok_or("operator is not a string")?;

        let nums = args
            .iter()
            .map(|v| v.as_f64().map(|n| n as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| format!("non-numeric operand in {op}"))?;

        let arity = match op {
            "M" | "L" => 2,
            "H" | "V" => 1,
            "Q" => 4,
            "C" => 6,
            "Z" | "z" => 0,
            other => return Err(format!("unsupported operator {other:?}")),
        };
        if nums.len() != arity {
            return Err(format!("{op} expects {arity} operands, got {}", nums.len()));
        }

        Ok(match op {
            "M" => Self::MoveTo(nums[0], nums[1]),
            "L" => Self::LineTo(nums[0], nums[1]),
            "H" => Self::Horizontal(nums[0]),
            "V" => Self::Vertical(nums[0]),
            "Q" => Self::Quad(nums[0], nums[1], nums[2], nums[3]),
            "C" => Self::Cubic(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]),
            _ => Self::Close,
        })
    }
}
