//! Merging several PDFs into one.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::merge::{MergeOptions, merge_files};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let result = merge_files(&inputs, &MergeOptions::default()).await?;
//! println!("Merged {} files", result.statistics.files_merged);
//! # Ok(())
//! # }
//! ```

pub mod merger;

pub use merger::{MergeOptions, MergeResult, MergeStatistics, Merger, merge_documents};

use std::path::PathBuf;

use crate::error::Result;

/// Merge `inputs` with a default [`Merger`].
///
/// # Errors
///
/// See [`Merger::merge`].
pub async fn merge_files(inputs: &[PathBuf], options: &MergeOptions) -> Result<MergeResult> {
    Merger::new().merge(inputs, options).await
}
