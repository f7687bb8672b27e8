//! The page-and-layer editing core.
//!
//! - [`resolver`]: directives to an ordered page list (pure)
//! - [`pages`]: rebuild a document's page tree from that list
//! - [`compositor`]: draw annotation layers onto pages
//! - [`pipeline`]: load once, restructure, composite, serialize
//!
//! Nothing in here knows about files, HTTP or task tracking; callers hand in
//! bytes and get bytes (plus diagnostics) back.

pub mod compositor;
pub mod directives;
pub mod layers;
pub mod pages;
pub mod pipeline;
pub mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compositor::{CompositeOptions, Compositor};
pub use directives::{DirectiveSet, OrderedPage, PageChange, PageDirective, RotationChange};
pub use layers::{AnnotationLayer, ImageLayer, PathCommand, PathLayer, RectLayer, TextLayer};
pub use pipeline::{EditOptions, EditOutcome, EditPipeline};
pub use resolver::{ResolvedPage, resolve};

/// What went wrong with a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The layer targets a page the document does not have.
    PageOutOfRange,
    /// The layer payload (path commands, image bytes) could not be decoded.
    LayerDecodeFailure,
    /// The image source is a remote URL; remote content is never fetched.
    RemoteImageRejected,
    /// The layer has nothing to draw.
    EmptyLayer,
}

impl DiagnosticKind {
    /// Short machine-friendly name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageOutOfRange => "page_out_of_range",
            Self::LayerDecodeFailure => "layer_decode_failure",
            Self::RemoteImageRejected => "remote_image_rejected",
            Self::EmptyLayer => "empty_layer",
        }
    }
}

/// A non-fatal, per-layer problem reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Position of the layer in the request.
    pub layer_index: usize,
    /// Page number the layer asked for.
    pub page_num: i64,
    /// Category.
    pub kind: DiagnosticKind,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layer {} (page {}): {}: {}",
            self.layer_index,
            self.page_num,
            self.kind.as_str(),
            self.message
        )
    }
}

/// What to do with layers that target a page outside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Drop the layer and report a [`DiagnosticKind::PageOutOfRange`].
    #[default]
    Skip,
    /// Fail the whole composite with an invalid-directive error.
    Reject,
}

impl std::str::FromStr for OutOfRangePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("Invalid out-of-range policy: {s}. Use: skip or reject")),
        }
    }
}
