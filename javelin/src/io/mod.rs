//! File I/O for javelin.
//!
//! - Loading PDF documents from disk, one at a time or in bounded parallel
//! - Serializing and compressing documents
//! - Atomic writes of output files
//!
//! # Examples
//!
//! ```no_run
//! use javelin::io::{PdfReader, PdfWriter};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new();
//! let loaded = reader.load(&PathBuf::from("input.pdf")).await?;
//!
//! let writer = PdfWriter::new();
//! writer.save(&loaded.document, &PathBuf::from("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod writer;

pub use reader::{LoadResult, LoadStatistics, LoadedPdf, PdfReader, has_pdf_header, read_file};
pub use writer::{PdfWriter, WriteOptions, WriteStatistics, compress_document, serialize_document};

use std::path::Path;

use lopdf::Document;

use crate::error::Result;

/// Load a PDF document from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid PDF.
pub async fn load_pdf(path: &Path) -> Result<Document> {
    let loaded = PdfReader::new().load(path).await?;
    Ok(loaded.document)
}

/// Save a PDF document with default options.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn save_pdf(doc: &Document, path: &Path) -> Result<()> {
    PdfWriter::new().save(doc, path).await
}
