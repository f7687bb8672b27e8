//! The edit pipeline: one load, one save.
//!
//! ```text
//! bytes ──parse──▶ Document ──resolve + restructure──▶ ──composite──▶ ──serialize──▶ bytes
//! ```
//!
//! Page directives run before layers, so layer page numbers always refer to
//! pages of the *output* document.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::edit::{DirectiveSet, EditPipeline};
//!
//! # fn example(source: &[u8]) -> javelin::Result<()> {
//! let directives = DirectiveSet::from_json(r#"{"mode":"sparse","changes":[{"pageNum":1,"rotation":90}]}"#)?;
//! let outcome = EditPipeline::default().run(source, Some(&directives), None)?;
//! println!("{} pages, {} bytes", outcome.page_count, outcome.bytes.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tokio::task;
use tracing::{info, instrument};

use crate::config::CompressionLevel;
use crate::edit::compositor::{CompositeOptions, Compositor};
use crate::edit::directives::DirectiveSet;
use crate::edit::layers::AnnotationLayer;
use crate::edit::pages::{page_count, restructure};
use crate::edit::resolver::resolve;
use crate::edit::Diagnostic;
use crate::error::{JavelinError, Result};
use crate::io::reader::{PdfReader, read_file};
use crate::io::writer::{PdfWriter, serialize_document};

/// Options for [`EditPipeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EditOptions {
    /// Compression applied when serializing the result.
    pub compression: CompressionLevel,
    /// Layer compositing options.
    pub composite: CompositeOptions,
}

/// Result of a successful edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// The edited PDF.
    pub bytes: Vec<u8>,
    /// Pages in the edited PDF.
    pub page_count: usize,
    /// Per-layer problems that did not stop the edit.
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies page directives and annotation layers to a PDF.
#[derive(Debug, Clone, Default)]
pub struct EditPipeline {
    options: EditOptions,
}

impl EditPipeline {
    /// Create a pipeline with the given options.
    pub fn new(options: EditOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    /// Edit an in-memory PDF.
    ///
    /// With neither directives nor layers the document is re-serialized
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::UnsupportedFormat`] if `source` is not a PDF
    /// - [`JavelinError::InvalidInput`] / [`JavelinError::EncryptedPdf`] if it
    ///   cannot be parsed or is encrypted
    /// - [`JavelinError::InvalidDirective`] for invalid directives, or for
    ///   out-of-range layers under [`OutOfRangePolicy::Reject`](crate::edit::OutOfRangePolicy::Reject)
    /// - [`JavelinError::EmptyResult`] when no page survives
    /// - [`JavelinError::SerializationFailure`] if the result cannot be written
    pub fn run(
        &self,
        source: &[u8],
        directives: Option<&DirectiveSet>,
        layers: Option<&[AnnotationLayer]>,
    ) -> Result<EditOutcome> {
        self.execute(source, "memory", directives, layers)
    }

    #[instrument(skip_all, fields(origin = %origin, source_len = source.len()))]
    fn execute(
        &self,
        source: &[u8],
        origin: &str,
        directives: Option<&DirectiveSet>,
        layers: Option<&[AnnotationLayer]>,
    ) -> Result<EditOutcome> {
        let mut doc = PdfReader::without_verification().parse(source, origin)?;
        let source_pages = page_count(&doc);
        if source_pages == 0 {
            return Err(JavelinError::EmptyResult { source_pages });
        }

        if let Some(directives) = directives {
            let resolved = resolve(source_pages, directives)?;
            if resolved.is_empty() {
                return Err(JavelinError::EmptyResult { source_pages });
            }
            restructure(&mut doc, &resolved)?;
        }

        let diagnostics = match layers {
            Some(layers) if !layers.is_empty() => {
                Compositor::new(self.options.composite).composite(&mut doc, layers)?
            }
            _ => Vec::new(),
        };

        let page_count = page_count(&doc);
        let bytes = serialize_document(&mut doc, self.options.compression)?;

        info!(
            source_pages,
            page_count,
            diagnostics = diagnostics.len(),
            bytes = bytes.len(),
            "Edit complete"
        );

        Ok(EditOutcome {
            bytes,
            page_count,
            diagnostics,
        })
    }

    /// Read `path` and edit it on the blocking pool.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus input file errors.
    pub async fn run_file(
        &self,
        path: &Path,
        directives: Option<&DirectiveSet>,
        layers: Option<&[AnnotationLayer]>,
    ) -> Result<EditOutcome> {
        let source = read_file(path).await?;
        let origin = path.display().to_string();
        let pipeline = self.clone();
        let directives = directives.cloned();
        let layers = layers.map(<[AnnotationLayer]>::to_vec);

        task::spawn_blocking(move || {
            pipeline.execute(&source, &origin, directives.as_ref(), layers.as_deref())
        })
        .await?
    }

    /// Edit `input` and atomically write the result to `output`.
    ///
    /// # Errors
    ///
    /// As [`run_file`](Self::run_file), plus output write errors.
    pub async fn run_to_file(
        &self,
        input: &Path,
        output: &Path,
        directives: Option<&DirectiveSet>,
        layers: Option<&[AnnotationLayer]>,
    ) -> Result<EditOutcome> {
        let outcome = self.run_file(input, directives, layers).await?;
        PdfWriter::new().write_bytes(&outcome.bytes, output).await?;
        Ok(outcome)
    }
}
