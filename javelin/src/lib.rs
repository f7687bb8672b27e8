//! javelin - merge, convert, edit and annotate PDF documents.
//!
//! The core is a page-and-layer editing pipeline: given a PDF, a (possibly
//! partial) set of page directives and a list of annotation layers, it
//! deterministically produces a new PDF. Around it sit the other document
//! operations:
//!
//! - Page reorder, rotate and delete ([`edit`])
//! - Flattening text, path, rectangle and image layers onto pages ([`edit`])
//! - Merging PDFs ([`merge`])
//! - Packing images into PDFs ([`convert`])
//! - Structural compression ([`io::compress_document`])
//! - Positioned text extraction for page inspection ([`analyze`])
//! - An append-only task log ([`task`])
//!
//! # Examples
//!
//! ## Editing pages
//!
//! ```no_run
//! use javelin::edit::{DirectiveSet, EditPipeline};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directives = DirectiveSet::from_json(
//!     r#"{"mode":"ordered","pages":[{"index":2},{"index":0,"rotate":90}]}"#,
//! )?;
//! let outcome = EditPipeline::default()
//!     .run_to_file(Path::new("in.pdf"), Path::new("out.pdf"), Some(&directives), None)
//!     .await?;
//! println!("{} pages", outcome.page_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Flattening annotations
//!
//! ```no_run
//! use javelin::edit::{AnnotationLayer, EditPipeline};
//!
//! # fn example(source: &[u8]) -> javelin::Result<()> {
//! let layers = AnnotationLayer::list_from_json(
//!     r##"[{"type":"text","pageNum":1,"text":"Approved","left":72,"top":72,"fill":"#c00"}]"##,
//! )?;
//! let outcome = EditPipeline::default().run(source, None, Some(&layers))?;
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyze;
pub mod config;
pub mod convert;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod io;
pub mod merge;
pub mod output;
pub mod task;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use error::{ErrorKind, JavelinError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
