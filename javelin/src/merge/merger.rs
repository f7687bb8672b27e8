//! Core PDF merging.
//!
//! Documents are concatenated in input order: every page of the first
//! document, then every page of the second, and so on. Later documents are
//! renumbered past the highest object id already in use, their objects are
//! moved across, and their pages are attached directly under the first
//! document's root `/Pages` node. Moved pages carry every inheritable
//! attribute explicitly so nothing leaks in from the new parent.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{info, instrument, warn};

use crate::config::CompressionLevel;
use crate::edit::pages::page_ids;
use crate::error::{JavelinError, Result};
use crate::geometry::{inherited_attribute, page_media_box, page_rotation};
use crate::io::{PdfReader, compress_document};
use crate::utils::format_file_size;

/// Options for a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOptions {
    /// Compression applied to the merged document.
    pub compression: CompressionLevel,

    /// Skip inputs that fail to load instead of failing the merge.
    pub continue_on_error: bool,

    /// Parallel loads (`None` = number of CPUs).
    pub jobs: Option<usize>,
}

impl MergeOptions {
    fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Statistics about a merge.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Number of inputs merged.
    pub files_merged: usize,

    /// Number of inputs skipped because they failed to load.
    pub files_skipped: usize,

    /// Pages in the merged document.
    pub total_pages: usize,

    /// Wall time for the whole merge.
    pub merge_time: Duration,

    /// Time spent loading inputs.
    pub load_time: Duration,

    /// Total size of merged inputs.
    pub input_size: u64,

    /// Compression applied.
    pub compression: CompressionLevel,
}

impl MergeStatistics {
    /// Input size as a human-readable string.
    pub fn format_input_size(&self) -> String {
        format_file_size(self.input_size)
    }
}

/// Result of a merge.
#[derive(Debug)]
pub struct MergeResult {
    /// The merged document.
    pub document: Document,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,

    /// Inputs that made it into the result, in order.
    pub merged_files: Vec<PathBuf>,
}

/// Combines multiple PDF files into one.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    reader: PdfReader,
}

impl Merger {
    /// Create a merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and merge `inputs`, in order.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::NoInputs`] if `inputs` is empty, or every input was
    ///   skipped
    /// - the first load error, unless `continue_on_error` is set
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use javelin::merge::{Merger, MergeOptions};
    /// # use std::path::PathBuf;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
    /// let result = Merger::new().merge(&inputs, &MergeOptions::default()).await?;
    /// println!("{} pages", result.statistics.total_pages);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn merge(&self, inputs: &[PathBuf], options: &MergeOptions) -> Result<MergeResult> {
        if inputs.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        let merge_start = Instant::now();
        let (load_results, load_stats) = self.reader.load_all(inputs, options.effective_jobs()).await;

        let mut loaded = Vec::with_capacity(load_results.len());
        let mut skipped = 0;
        for result in load_results {
            match result {
                Ok(pdf) => loaded.push(pdf),
                Err(e) if options.continue_on_error => {
                    warn!(error = %e, "Skipping input");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if loaded.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        let input_size = loaded.iter().map(|p| p.file_size).sum();
        let mut merged_files = Vec::with_capacity(loaded.len());
        let mut documents = Vec::with_capacity(loaded.len());
        for pdf in loaded {
            merged_files.push(pdf.path);
            documents.push(pdf.document);
        }

        let mut document = merge_documents(documents)?;
        compress_document(&mut document, options.compression);

        let statistics = MergeStatistics {
            files_merged: merged_files.len(),
            files_skipped: skipped,
            total_pages: document.get_pages().len(),
            merge_time: merge_start.elapsed(),
            load_time: load_stats.total_time,
            input_size,
            compression: options.compression,
        };

        info!(
            files = statistics.files_merged,
            pages = statistics.total_pages,
            "Merged documents"
        );

        Ok(MergeResult {
            document,
            statistics,
            merged_files,
        })
    }
}

/// Concatenate documents in order.
///
/// # Errors
///
/// - [`JavelinError::NoInputs`] for an empty list
/// - [`JavelinError::InvalidInput`] if the first document has no usable
///   page tree
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    let mut documents = documents.into_iter();
    let mut merged = documents.next().ok_or(JavelinError::NoInputs)?;
    let root_pages = root_pages_id(&merged)?;

    for mut doc in documents {
        doc.renumber_objects_with(merged.max_id + 1);

        let mut moved = Vec::new();
        for page_id in page_ids(&doc) {
            let Some(mut dict) = detached_page(&doc, page_id) else {
                continue;
            };
            dict.set("Parent", root_pages);
            moved.push((page_id, dict));
        }

        for (page_id, dict) in &moved {
            doc.objects.insert(*page_id, Object::Dictionary(dict.clone()));
        }

        merged.max_id = merged.max_id.max(doc.max_id);
        merged.objects.extend(doc.objects);

        let new_kids: Vec<ObjectId> = moved.into_iter().map(|(id, _)| id).collect();
        append_kids(&mut merged, root_pages, &new_kids)?;
    }

    merged.prune_objects();
    merged.renumber_objects();
    Ok(merged)
}

/// A copy of a page whose inheritable attributes no longer depend on its
/// ancestors. Absent attributes get their PDF defaults.
fn detached_page(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut dict = doc.get_dictionary(page_id).ok()?.clone();

    let media = page_media_box(doc, page_id);
    let media_box: Vec<Object> = vec![media.x0.into(), media.y0.into(), media.x1.into(), media.y1.into()];
    let inherited = |key: &[u8], default: Object| inherited_attribute(doc, page_id, key).cloned().unwrap_or(default);

    let defaults = [
        (&b"MediaBox"[..], Object::Array(media_box.clone())),
        (&b"CropBox"[..], inherited(b"CropBox", Object::Array(media_box))),
        (&b"Resources"[..], inherited(b"Resources", Object::Dictionary(Dictionary::new()))),
        (&b"Rotate"[..], Object::Integer(page_rotation(doc, page_id))),
    ];
    for (key, value) in defaults {
        if !dict.has(key) {
            dict.set(key.to_vec(), value);
        }
    }
    Some(dict)
}

fn root_pages_id(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| JavelinError::invalid_input("document", format!("missing page tree: {e}")))
}

fn append_kids(doc: &mut Document, pages_id: ObjectId, kids: &[ObjectId]) -> Result<()> {
    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| JavelinError::invalid_input("document", format!("bad page tree: {e}")))?;

    let mut all_kids = pages
        .get(b"Kids")
        .and_then(Object::as_array)
        .cloned()
        .unwrap_or_default();
    all_kids.extend(kids.iter().map(|&id| Object::Reference(id)));

    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0) + kids.len() as i64;
    pages.set("Kids", all_kids);
    pages.set("Count", count);
    Ok(())
}
