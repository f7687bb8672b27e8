//! PDF serialization and saving.
//!
//! - [`compress_document`] applies a [`CompressionLevel`] in place
//! - [`serialize_document`] compresses and renders a document to bytes
//! - [`PdfWriter`] writes bytes or documents to disk atomically (temp file
//!   plus rename), doing the CPU-heavy part on the blocking pool
//!
//! # Examples
//!
//! ```no_run
//! use javelin::io::writer::PdfWriter;
//! use lopdf::Document;
//! use std::path::Path;
//!
//! # async fn example(doc: Document) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = PdfWriter::new();
//! writer.save(&doc, Path::new("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lopdf::Document;
use tokio::task;
use tracing::{debug, instrument};

use crate::config::CompressionLevel;
use crate::error::{JavelinError, Result};
use crate::utils::format_file_size;

/// Apply a compression level to a document in place.
///
/// `Maximum` is structural: it drops unreachable objects and empty streams
/// and renumbers what is left. Page content is never re-encoded lossily.
pub fn compress_document(doc: &mut Document, level: CompressionLevel) {
    match level {
        CompressionLevel::None => {}
        CompressionLevel::Standard => {
            doc.compress();
        }
        CompressionLevel::Maximum => {
            let empty = doc.delete_zero_length_streams();
            let pruned = doc.prune_objects();
            doc.renumber_objects();
            doc.compress();
            debug!(
                empty_streams = empty.len(),
                pruned = pruned.len(),
                "Applied maximum compression"
            );
        }
    }
}

/// Compress `doc` at `level` and render it to PDF bytes.
///
/// # Errors
///
/// Returns [`JavelinError::SerializationFailure`] if lopdf cannot write the
/// document.
pub fn serialize_document(doc: &mut Document, level: CompressionLevel) -> Result<Vec<u8>> {
    compress_document(doc, level);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| JavelinError::serialization(e.to_string()))?;
    Ok(bytes)
}

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Write to a temporary sibling file, then rename over the target.
    pub atomic: bool,

    /// Compression applied by [`PdfWriter::save`].
    pub compression: CompressionLevel,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            compression: CompressionLevel::Standard,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to serialize and write.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,

    /// Compression that was applied.
    pub compression: CompressionLevel,
}

impl WriteStatistics {
    /// File size as a human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// PDF writer with configurable behavior.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Create a writer applying the given compression.
    pub fn with_compression(compression: CompressionLevel) -> Self {
        Self {
            options: WriteOptions {
                compression,
                ..WriteOptions::default()
            },
        }
    }

    /// Create a writer without atomic writes.
    pub fn non_atomic() -> Self {
        Self {
            options: WriteOptions {
                atomic: false,
                ..WriteOptions::default()
            },
        }
    }

    /// The options in use.
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Save a document to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub async fn save(&self, doc: &Document, path: &Path) -> Result<()> {
        self.save_with_stats(doc, path).await.map(|_| ())
    }

    /// Save a document and report statistics.
    ///
    /// The document is cloned; the caller's copy is left uncompressed.
    #[instrument(skip(self, doc), fields(path = %path.display()))]
    pub async fn save_with_stats(&self, doc: &Document, path: &Path) -> Result<WriteStatistics> {
        let start = Instant::now();
        let level = self.options.compression;
        let mut doc = doc.clone();

        let bytes = task::spawn_blocking(move || serialize_document(&mut doc, level))
            .await??;

        let mut stats = self.write_bytes(&bytes, path).await?;
        stats.write_time = start.elapsed();
        stats.compression = level;
        Ok(stats)
    }

    /// Write already-serialized PDF bytes to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::FailedToCreateOutput`] or
    /// [`JavelinError::FailedToWrite`] on filesystem errors.
    pub async fn write_bytes(&self, bytes: &[u8], path: &Path) -> Result<WriteStatistics> {
        let start = Instant::now();
        let write_path = if self.options.atomic {
            temp_path_for(path)
        } else {
            path.to_path_buf()
        };

        tokio::fs::write(&write_path, bytes)
            .await
            .map_err(|e| JavelinError::FailedToCreateOutput {
                path: write_path.clone(),
                source: e,
            })?;

        if self.options.atomic
            && let Err(e) = tokio::fs::rename(&write_path, path).await
        {
            let _ = tokio::fs::remove_file(&write_path).await;
            return Err(JavelinError::FailedToWrite {
                path: path.to_path_buf(),
                source: e,
            });
        }

        debug!(bytes = bytes.len(), path = %path.display(), "Wrote PDF");

        Ok(WriteStatistics {
            write_time: start.elapsed(),
            file_size: bytes.len() as u64,
            output_path: path.to_path_buf(),
            compression: CompressionLevel::None,
        })
    }

    /// Pre-flight check that `path` can be written.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::InvalidConfig`] if the parent directory is
    /// missing or read-only.
    pub async fn can_write(&self, path: &Path) -> Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
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

    /// Whether `path` exists.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }
}

/// `out.pdf` -> `out.pdf.tmp`, in the same directory so rename is atomic.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};
    use tempfile::TempDir;

    fn create_test_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 72 720 Td (Hello Hello Hello Hello) Tj ET".repeat(20),
        ));
        let empty = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let _orphan = doc.add_object(dictionary! { "Unused" => empty });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn test_serialize_none_vs_standard() {
        let raw = serialize_document(&mut create_test_document(), CompressionLevel::None).unwrap();
        let packed =
            serialize_document(&mut create_test_document(), CompressionLevel::Standard).unwrap();
        assert!(raw.starts_with(b"%PDF-"));
        assert!(packed.len() < raw.len());
    }

    #[test]
    fn test_maximum_prunes_and_stays_loadable() {
        let mut doc = create_test_document();
        let before = doc.objects.len();
        let bytes = serialize_document(&mut doc, CompressionLevel::Maximum).unwrap();
        assert!(doc.objects.len() < before);

        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path_for(Path::new("/tmp/out.pdf")),
            PathBuf::from("/tmp/out.pdf.tmp")
        );
    }

    #[tokio::test]
    async fn test_save_with_stats() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output.pdf");

        let stats = PdfWriter::new()
            .save_with_stats(&create_test_document(), &output)
            .await
            .unwrap();

        assert!(output.exists());
        assert!(!temp_path_for(&output).exists());
        assert_eq!(stats.output_path, output);
        assert_eq!(stats.compression, CompressionLevel::Standard);
        assert_eq!(stats.file_size, std::fs::metadata(&output).unwrap().len());
    }

    #[tokio::test]
    async fn test_non_atomic_write_bytes() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("raw.pdf");

        PdfWriter::non_atomic()
            .write_bytes(b"%PDF-1.5\n", &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.5\n");
    }

    #[tokio::test]
    async fn test_with_options_keeps_document_uncompressed() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("plain.pdf");
        let writer = PdfWriter::with_options(WriteOptions {
            atomic: false,
            compression: CompressionLevel::None,
        });

        let stats = writer
            .save_with_stats(&create_test_document(), &output)
            .await
            .unwrap();

        assert_eq!(stats.compression, CompressionLevel::None);
        let written = std::fs::read(&output).unwrap();
        assert!(written.windows(5).any(|w| w == b"Hello"));
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let err = PdfWriter::new()
            .write_bytes(b"%PDF-1.5\n", Path::new("/nonexistent/dir/out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, JavelinError::FailedToCreateOutput { .. }));
    }

    #[tokio::test]
    async fn test_can_write() {
        let dir = TempDir::new().unwrap();
        let writer = PdfWriter::new();
        assert!(writer.can_write(&dir.path().join("out.pdf")).await.is_ok());
        assert!(
            writer
                .can_write(Path::new("/nonexistent/out.pdf"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("existing.pdf");
        std::fs::write(&existing, b"x").unwrap();

        let writer = PdfWriter::new();
        assert!(writer.exists(&existing).await);
        assert!(!writer.exists(&dir.path().join("missing.pdf")).await);
    }
}
