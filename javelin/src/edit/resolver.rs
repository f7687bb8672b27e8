//! Page operation resolution.
//!
//! Turns a [`DirectiveSet`] into the exact sequence of source pages (and the
//! rotation each one gets) that the output document will contain. This is a
//! pure function: it never touches a document, only a page count.

use std::collections::HashSet;

use tracing::debug;

use crate::edit::directives::{DirectiveSet, PageDirective, RotationChange};
use crate::error::{JavelinError, Result};

/// One page of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPage {
    /// 0-based index of the source page.
    pub source_index: usize,
    /// Rotation to apply to the source page's intrinsic rotation.
    pub rotation: RotationChange,
}

impl ResolvedPage {
    /// An unchanged copy of `source_index`.
    pub fn unchanged(source_index: usize) -> Self {
        Self {
            source_index,
            rotation: RotationChange::NONE,
        }
    }
}

/// Resolve directives against a document with `page_count` pages.
///
/// Validation is fail-closed: a single out-of-range index, out-of-range page
/// number, duplicated sparse entry or non-90 rotation rejects the whole
/// request and no partial output is produced.
///
/// An empty directive set of either mode keeps every page, in order, with
/// no rotation.
///
/// # Errors
///
/// Returns [`JavelinError::InvalidDirective`] on any invalid directive.
///
/// # Examples
///
/// ```
/// use javelin::edit::{resolve, DirectiveSet, OrderedPage, RotationChange};
///
/// let set = DirectiveSet::Ordered {
///     pages: vec![
///         OrderedPage { index: 2, rotate: 0, absolute: false },
///         OrderedPage { index: 0, rotate: 90, absolute: false },
///     ],
/// };
/// let pages = resolve(3, &set).unwrap();
/// assert_eq!(pages.len(), 2);
/// assert_eq!(pages[0].source_index, 2);
/// assert_eq!(pages[1].rotation, RotationChange::Delta(90));
/// ```
pub fn resolve(page_count: usize, directives: &DirectiveSet) -> Result<Vec<ResolvedPage>> {
    if directives.is_empty() {
        return Ok((0..page_count).map(ResolvedPage::unchanged).collect());
    }

    let resolved = match directives {
        DirectiveSet::Ordered { pages } => {
            let normalized = pages
                .iter()
                .map(|page| page.normalize(page_count))
                .collect::<Result<Vec<_>>>()?;
            resolve_ordered(&normalized)
        }
        DirectiveSet::Sparse { changes } => {
            let normalized = changes
                .iter()
                .map(|change| change.normalize(page_count))
                .collect::<Result<Vec<_>>>()?;
            resolve_sparse(page_count, &normalized)?
        }
    };

    debug!(
        page_count,
        directives = directives.len(),
        output_pages = resolved.len(),
        "Resolved page directives"
    );

    Ok(resolved)
}

fn resolve_ordered(directives: &[PageDirective]) -> Vec<ResolvedPage> {
    directives
        .iter()
        .map(|d| ResolvedPage {
            source_index: d.source_index,
            rotation: d.rotation,
        })
        .collect()
}

fn resolve_sparse(page_count: usize, directives: &[PageDirective]) -> Result<Vec<ResolvedPage>> {
    let mut by_index: Vec<Option<&PageDirective>> = vec![None; page_count];
    let mut seen = HashSet::with_capacity(directives.len());

    for directive in directives {
        if !seen.insert(directive.source_index) {
            return Err(JavelinError::invalid_directive(format!(
                "page number {} appears more than once",
                directive.source_index + 1
            )));
        }
        by_index[directive.source_index] = Some(directive);
    }

    Ok(by_index
        .into_iter()
        .enumerate()
        .filter_map(|(source_index, change)| match change {
            Some(d) if d.deleted => None,
            Some(d) => Some(ResolvedPage {
                source_index,
                rotation: d.rotation,
            }),
            None => Some(ResolvedPage::unchanged(source_index)),
        })
        .collect())
}
