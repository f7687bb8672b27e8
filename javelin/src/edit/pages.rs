//! Page tree restructuring.
//!
//! Rebuilds a document's page tree so it contains exactly the resolved pages,
//! in order, each with its final rotation. The old tree is detached and
//! anything only it referenced is pruned.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, instrument};

use crate::edit::resolver::ResolvedPage;
use crate::error::{JavelinError, Result};
use crate::geometry::{inherited_attribute, page_rotation};

/// Attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Source page ids in document order.
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Number of pages in a document.
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Replace the page tree of `doc` with the resolved page sequence.
///
/// The first occurrence of a source page reuses its object; later
/// occurrences get an independent copy so each slot can carry its own
/// rotation and overlay. Inherited attributes are copied onto every page
/// because the new tree is a single flat `/Pages` node.
///
/// Document outlines are dropped since they may point at removed pages.
///
/// # Errors
///
/// - [`JavelinError::EmptyResult`] when `resolved` is empty
/// - [`JavelinError::InvalidInput`] when the page tree is malformed
#[instrument(skip_all, fields(output_pages = resolved.len()))]
pub fn restructure(doc: &mut Document, resolved: &[ResolvedPage]) -> Result<()> {
    let sources = page_ids(doc);
    if resolved.is_empty() {
        return Err(JavelinError::EmptyResult {
            source_pages: sources.len(),
        });
    }

    // Snapshot every page before the tree changes underneath us.
    let mut snapshots = Vec::with_capacity(sources.len());
    for &page_id in &sources {
        snapshots.push((page_id, materialized_page(doc, page_id)?, page_rotation(doc, page_id)));
    }

    let pages_id = doc.new_object_id();
    let mut used = HashSet::with_capacity(resolved.len());
    let mut kids = Vec::with_capacity(resolved.len());

    for page in resolved {
        let (source_id, template, intrinsic) = snapshots.get(page.source_index).ok_or_else(|| {
            JavelinError::invalid_directive(format!(
                "page index {} is out of range for a {}-page document",
                page.source_index,
                sources.len()
            ))
        })?;

        let mut dict = template.clone();
        dict.set("Parent", pages_id);
        dict.set("Rotate", page.rotation.apply(*intrinsic));

        let id = if used.insert(*source_id) {
            doc.objects.insert(*source_id, Object::Dictionary(dict));
            *source_id
        } else {
            doc.add_object(dict)
        };
        kids.push(Object::Reference(id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog = doc
        .catalog_mut()
        .map_err(|e| JavelinError::invalid_input("document", format!("missing catalog: {e}")))?;
    catalog.set("Pages", pages_id);
    catalog.remove(b"Outlines");

    let pruned = doc.prune_objects();
    debug!(
        kept = used.len(),
        pruned = pruned.len(),
        "Rebuilt page tree"
    );

    Ok(())
}

/// A copy of the page dictionary with inheritable attributes made explicit.
fn materialized_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut dict = doc
        .get_dictionary(page_id)
        .map_err(|e| JavelinError::invalid_input("document", format!("bad page object: {e}")))?
        .clone();

    for key in INHERITABLE {
        if dict.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key) {
            dict.set(key.to_vec(), value.clone());
        }
    }

    Ok(dict)
}
