//! Page directive payloads.
//!
//! Two request shapes exist in the wild: an ordered list where the list *is*
//! the new document, and a sparse map of changes against the original pages.
//! Both are accepted behind one [`DirectiveSet`] with an explicit `mode`
//! discriminant, and both normalize into [`PageDirective`].

use serde::{Deserialize, Serialize};

use crate::error::{JavelinError, Result};

/// How a directive changes a page's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "degrees", rename_all = "snake_case")]
pub enum RotationChange {
    /// Add to the page's intrinsic rotation.
    Delta(i64),
    /// Replace the page's intrinsic rotation.
    Absolute(i64),
}

impl RotationChange {
    /// No change.
    pub const NONE: RotationChange = RotationChange::Delta(0);

    /// Build a validated change from raw degrees.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::InvalidDirective`] if `degrees` is not a
    /// multiple of 90. Values are never rounded.
    pub fn new(degrees: i64, absolute: bool) -> Result<Self> {
        let normalized = normalize_rotation(degrees)?;
        Ok(if absolute {
            Self::Absolute(normalized)
        } else {
            Self::Delta(normalized)
        })
    }

    /// The rotation that results from applying this change to `intrinsic`.
    pub fn apply(&self, intrinsic: i64) -> i64 {
        match self {
            Self::Delta(delta) => (intrinsic + delta).rem_euclid(360),
            Self::Absolute(value) => *value,
        }
    }

    /// The delta component, or `None` for absolute changes.
    pub fn delta(&self) -> Option<i64> {
        match self {
            Self::Delta(delta) => Some(*delta),
            Self::Absolute(_) => None,
        }
    }

    /// True when applying this change leaves every page as it was.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Delta(0))
    }
}

impl Default for RotationChange {
    fn default() -> Self {
        Self::NONE
    }
}

/// Normalize a rotation into `0..360`.
///
/// # Errors
///
/// Returns [`JavelinError::InvalidDirective`] for non-multiples of 90.
pub fn normalize_rotation(degrees: i64) -> Result<i64> {
    if degrees % 90 != 0 {
        return Err(JavelinError::invalid_directive(format!(
            "rotation must be a multiple of 90 degrees, got {degrees}"
        )));
    }
    Ok(degrees.rem_euclid(360))
}

/// One entry of an ordered-list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderedPage {
    /// 0-based index of the source page.
    pub index: i64,
    /// Rotation in degrees; added to the intrinsic rotation unless `absolute`.
    #[serde(default, alias = "rotation")]
    pub rotate: i64,
    /// Treat `rotate` as the page's new absolute rotation.
    #[serde(default)]
    pub absolute: bool,
}

/// One entry of a sparse change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PageChange {
    /// 1-based page number in the original document.
    pub page_num: i64,
    /// Rotation in degrees; added to the intrinsic rotation unless `absolute`.
    #[serde(default, alias = "rotate")]
    pub rotation: i64,
    /// Treat `rotation` as the page's new absolute rotation.
    #[serde(default)]
    pub absolute: bool,
    /// Drop the page from the output.
    #[serde(default)]
    pub deleted: bool,
}

/// A complete page-editing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DirectiveSet {
    /// The list order is the output order; unmentioned pages are dropped.
    Ordered {
        /// New page sequence.
        #[serde(default)]
        pages: Vec<OrderedPage>,
    },
    /// Every original page passes through unless changed here.
    Sparse {
        /// Per-page changes keyed by 1-based page number.
        #[serde(default)]
        changes: Vec<PageChange>,
    },
}

impl DirectiveSet {
    /// Parse a JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::InvalidDirective`] for malformed or
    /// unknown-shaped payloads.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// A request that keeps every page unchanged.
    pub fn pass_through() -> Self {
        Self::Ordered { pages: Vec::new() }
    }

    /// True when the request carries no directives at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ordered { pages } => pages.is_empty(),
            Self::Sparse { changes } => changes.is_empty(),
        }
    }

    /// Number of directives in the request.
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered { pages } => pages.len(),
            Self::Sparse { changes } => changes.len(),
        }
    }
}

/// A directive normalized against a concrete source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDirective {
    /// 0-based index into the source document.
    pub source_index: usize,
    /// Rotation to apply.
    pub rotation: RotationChange,
    /// Whether the page is dropped.
    pub deleted: bool,
}

impl OrderedPage {
    /// Normalize against a document with `page_count` pages.
    pub(crate) fn normalize(&self, page_count: usize) -> Result<PageDirective> {
        let source_index = usize::try_from(self.index)
            .ok()
            .filter(|idx| *idx < page_count)
            .ok_or_else(|| {
                JavelinError::invalid_directive(format!(
                    "page index {} is out of range for a {page_count}-page document",
                    self.index
                ))
            })?;

        Ok(PageDirective {
            source_index,
            rotation: RotationChange::new(self.rotate, self.absolute)?,
            deleted: false,
        })
    }
}

impl PageChange {
    /// Normalize against a document with `page_count` pages.
    pub(crate) fn normalize(&self, page_count: usize) -> Result<PageDirective> {
        let source_index = usize::try_from(self.page_num)
            .ok()
            .filter(|num| (1..=page_count).contains(num))
            .map(|num| num - 1)
            .ok_or_else(|| {
                JavelinError::invalid_directive(format!(
                    "page number {} is out of range for a {page_count}-page document",
                    self.page_num
                ))
            })?;

        Ok(PageDirective {
            source_index,
            rotation: RotationChange::new(self.rotation, self.absolute)?,
            deleted: self.deleted,
        })
    }
}
