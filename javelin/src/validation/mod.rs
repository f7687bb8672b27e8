//! Input and output checks run before an operation starts.
//!
//! - existence and accessibility of input files
//! - `%PDF-` header (anything else is [`JavelinError::UnsupportedFormat`])
//! - encryption
//! - documents without pages
//! - output overwrite policy and parent directory
//!
//! # Examples
//!
//! ```no_run
//! use javelin::validation::Validator;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let result = Validator::new().validate_file(Path::new("doc.pdf")).await?;
//! println!("{} pages", result.page_count);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::OverwriteMode;
use crate::error::{JavelinError, Result};
use crate::geometry::page_media_box;
use crate::io::{PdfReader, read_file};
use crate::utils::format_file_size;

/// Facts about one valid input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Validated file.
    pub path: PathBuf,

    /// Number of pages.
    pub page_count: usize,

    /// Header version, e.g. `(1, 7)`.
    pub version: Option<(u8, u8)>,

    /// File size in bytes.
    pub file_size: u64,

    /// Number of indirect objects.
    pub object_count: usize,

    /// Width and height of the first page, in points.
    pub first_page_size: Option<(f32, f32)>,
}

impl ValidationResult {
    fn from_document(path: PathBuf, file_size: u64, doc: &Document) -> Self {
        let pages = doc.get_pages();
        let version = doc
            .version
            .split_once('.')
            .and_then(|(major, minor)| Some((major.parse().ok()?, minor.parse().ok()?)));

        let first_page_size = pages.values().next().map(|&id| {
            let media = page_media_box(doc, id);
            (media.width(), media.height())
        });

        Self {
            path,
            page_count: pages.len(),
            version,
            file_size,
            object_count: doc.objects.len(),
            first_page_size,
        }
    }
}

/// Results for a batch of inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// One entry per valid input, in order.
    pub results: Vec<ValidationResult>,

    /// Pages across all valid inputs.
    pub total_pages: usize,

    /// Bytes across all valid inputs.
    pub total_size: u64,

    /// Inputs that passed.
    pub files_validated: usize,

    /// Inputs that failed and were skipped.
    pub files_failed: usize,
}

impl ValidationSummary {
    /// Build a summary from passing results.
    pub fn from_results(results: Vec<ValidationResult>, files_failed: usize) -> Self {
        Self {
            total_pages: results.iter().map(|r| r.page_count).sum(),
            total_size: results.iter().map(|r| r.file_size).sum(),
            files_validated: results.len(),
            files_failed,
            results,
        }
    }

    /// Total size as a human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Validates input PDFs and output paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    reader: PdfReader,
}

impl Validator {
    /// Create a validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a single PDF file.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::FileNotFound`] / [`JavelinError::NotAFile`] /
    ///   [`JavelinError::FileNotAccessible`]
    /// - [`JavelinError::UnsupportedFormat`] for empty or non-PDF files
    /// - [`JavelinError::EncryptedPdf`]
    /// - [`JavelinError::InvalidInput`] for corrupt or page-less documents
    pub async fn validate_file(&self, path: &Path) -> Result<ValidationResult> {
        let bytes = read_file(path).await?;
        let file_size = bytes.len() as u64;
        let origin = path.display().to_string();

        let reader = self.reader;
        let doc = tokio::task::spawn_blocking(move || reader.parse(&bytes, &origin))
            .await??;

        Ok(ValidationResult::from_document(path.to_path_buf(), file_size, &doc))
    }

    /// Validate several files.
    ///
    /// # Errors
    ///
    /// Returns the first failure unless `continue_on_error` is set, and
    /// [`JavelinError::NoInputs`] if nothing passes.
    pub async fn validate_files(
        &self,
        paths: &[PathBuf],
        continue_on_error: bool,
    ) -> Result<ValidationSummary> {
        let mut results = Vec::with_capacity(paths.len());
        let mut failed = 0;

        for path in paths {
            match self.validate_file(path).await {
                Ok(result) => results.push(result),
                Err(e) if continue_on_error => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid input");
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if results.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        Ok(ValidationSummary::from_results(results, failed))
    }

    /// Check that `output` may be written under `mode`.
    ///
    /// `Prompt` is left to the caller: an existing file passes here.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::OutputExists`] for an existing file under `NoClobber`
    /// - [`JavelinError::InvalidConfig`] if the parent directory is missing or
    ///   read-only
    pub async fn validate_output(&self, output: &Path, mode: OverwriteMode) -> Result<()> {
        if mode == OverwriteMode::NoClobber && tokio::fs::metadata(output).await.is_ok() {
            return Err(JavelinError::output_exists(output.to_path_buf()));
        }

        let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let metadata = tokio::fs::metadata(parent).await.map_err(|_| {
            JavelinError::invalid_config(format!(
                "Output directory does not exist: {}",
                parent.display()
            ))
        })?;

        if metadata.permissions().readonly() {
            return Err(JavelinError::invalid_config(format!(
                "Output directory is not writable: {}",
                parent.display()
            )));
        }

        Ok(())
    }
}
