//! PDF reading and loading.
//!
//! Files are read with tokio and parsed on the blocking pool. Parsing itself
//! ([`PdfReader::parse`]) is synchronous and works on bytes, which is what the
//! edit pipeline uses directly.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::io::reader::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new();
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let (results, stats) = reader.load_all(&paths, 4).await;
//! println!("{} of {} loaded", stats.success_count, results.len());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use lopdf::Document;
use tokio::task;
use tracing::{debug, instrument, warn};

use crate::error::{JavelinError, Result};
use crate::utils::format_file_size;

/// Magic bytes every PDF starts with.
pub const PDF_HEADER: &[u8] = b"%PDF-";

/// Batches at or below this size are loaded one by one.
const SEQUENTIAL_THRESHOLD: usize = 3;

/// Whether `bytes` begin with a PDF header, ignoring leading whitespace.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PDF_HEADER)
}

/// A loaded PDF document with metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Number of pages in the document.
    pub page_count: usize,

    /// Time taken to read and parse the document.
    pub load_time: Duration,

    /// File size in bytes.
    pub file_size: u64,
}

/// Result of a load operation (success or failure).
pub type LoadResult = Result<LoadedPdf>;

/// Statistics for a batch load.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Number of PDFs successfully loaded.
    pub success_count: usize,

    /// Number of PDFs that failed to load.
    pub failure_count: usize,

    /// Wall time for the whole batch.
    pub total_time: Duration,

    /// Average time per successful load.
    pub average_time: Duration,

    /// Total size of successfully loaded files.
    pub total_size: u64,

    /// Total number of pages loaded.
    pub total_pages: usize,
}

impl LoadStatistics {
    fn from_results(results: &[LoadResult], total_time: Duration) -> Self {
        let mut stats = Self {
            total_time,
            ..Self::default()
        };
        let mut total_load_time = Duration::ZERO;

        for result in results {
            match result {
                Ok(loaded) => {
                    stats.success_count += 1;
                    stats.total_size += loaded.file_size;
                    stats.total_pages += loaded.page_count;
                    total_load_time += loaded.load_time;
                }
                Err(_) => stats.failure_count += 1,
            }
        }

        if stats.success_count > 0 {
            stats.average_time = total_load_time / stats.success_count as u32;
        }

        stats
    }

    /// Total size as a human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// PDF reader with configurable verification.
#[derive(Debug, Clone, Copy)]
pub struct PdfReader {
    /// Reject documents without pages.
    verify: bool,
}

impl PdfReader {
    /// Create a reader that rejects documents without pages.
    pub fn new() -> Self {
        Self { verify: true }
    }

    /// Create a reader that accepts documents without pages.
    pub fn without_verification() -> Self {
        Self { verify: false }
    }

    /// Parse a PDF from memory.
    ///
    /// `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::UnsupportedFormat`] if the bytes are not a PDF
    /// - [`JavelinError::EncryptedPdf`] if the document is encrypted
    /// - [`JavelinError::InvalidInput`] if parsing fails, or if verification
    ///   is on and the document has no pages
    pub fn parse(&self, bytes: &[u8], origin: &str) -> Result<Document> {
        if !has_pdf_header(bytes) {
            return Err(JavelinError::unsupported_format(
                origin,
                "input does not start with a %PDF- header",
            ));
        }

        let doc = Document::load_mem(bytes).map_err(|e| {
            let message = e.to_string();
            let lower = message.to_lowercase();
            if lower.contains("encrypt") || lower.contains("password") {
                JavelinError::encrypted(origin)
            } else {
                JavelinError::invalid_input(origin, message)
            }
        })?;

        if doc.is_encrypted() {
            return Err(JavelinError::encrypted(origin));
        }

        if self.verify && doc.get_pages().is_empty() {
            return Err(JavelinError::invalid_input(origin, "PDF has no pages"));
        }

        Ok(doc)
    }

    /// Load a single PDF document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails [`parse`](Self::parse).
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let start = Instant::now();
        let bytes = read_file(path).await?;
        let file_size = bytes.len() as u64;

        let reader = *self;
        let origin = path.display().to_string();
        let document = task::spawn_blocking(move || reader.parse(&bytes, &origin))
            .await??;

        let page_count = document.get_pages().len();
        let load_time = start.elapsed();
        debug!(page_count, file_size, ?load_time, "Loaded PDF");

        Ok(LoadedPdf {
            document,
            path: path.to_path_buf(),
            page_count,
            load_time,
            file_size,
        })
    }

    /// Load documents one at a time, in order.
    pub async fn load_sequential(&self, paths: &[PathBuf]) -> Vec<LoadResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(self.load(path).await);
        }
        results
    }

    /// Load documents with at most `workers` loads in flight.
    ///
    /// Results come back in input order regardless of completion order.
    pub async fn load_parallel(&self, paths: &[PathBuf], workers: usize) -> Vec<LoadResult> {
        let workers = workers.max(1);
        let reader = *self;

        let tasks = paths.iter().cloned().enumerate().map(|(idx, path)| async move {
            (idx, reader.load(&path).await)
        });

        let mut indexed: Vec<(usize, LoadResult)> = stream::iter(tasks)
            .buffer_unordered(workers)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        indexed.into_iter().map(|(_, result)| result).collect()
    }

    /// Load all documents, in parallel for larger batches.
    pub async fn load_all(
        &self,
        paths: &[PathBuf],
        max_workers: usize,
    ) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();

        let results = if paths.len() <= SEQUENTIAL_THRESHOLD {
            self.load_sequential(paths).await
        } else {
            self.load_parallel(paths, max_workers).await
        };

        let stats = LoadStatistics::from_results(&results, start.elapsed());
        if stats.failure_count > 0 {
            warn!(failed = stats.failure_count, "Some inputs failed to load");
        }

        (results, stats)
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a whole input file, mapping errors to input errors.
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => JavelinError::file_not_found(path.to_path_buf()),
        _ => JavelinError::FileNotAccessible {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_file() {
        return Err(JavelinError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| JavelinError::FileNotAccessible {
            path: path.to_path_buf(),
            source: e,
        })
}
