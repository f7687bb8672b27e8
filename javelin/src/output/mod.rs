//! User-facing output for the CLI.
//!
//! Structured logs go through `tracing`; this module covers what a user
//! reads on the terminal: status lines, summaries and the task table.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::config::Config;
//! use javelin::output::OutputFormatter;
//!
//! # fn example(config: Config) {
//! let formatter = OutputFormatter::from_config(&config);
//! formatter.info("Starting merge");
//! formatter.success("Merge completed");
//! # }
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter, format_message, task_row};

use std::path::Path;

use crate::edit::EditOutcome;
use crate::merge::MergeStatistics;
use crate::utils::format_file_size;
use crate::validation::ValidationSummary;

/// Report a validation summary.
pub fn display_validation_summary(formatter: &OutputFormatter, summary: &ValidationSummary) {
    if summary.files_failed > 0 {
        formatter.warning(&format!(
            "{} file(s) failed validation",
            summary.files_failed
        ));
    }

    formatter.info(&format!(
        "Validated {} file(s): {} pages, {}",
        summary.files_validated,
        summary.total_pages,
        summary.format_total_size()
    ));
}

/// Report merge statistics.
pub fn display_merge_statistics(formatter: &OutputFormatter, stats: &MergeStatistics) {
    if stats.files_skipped > 0 {
        formatter.warning(&format!("Skipped {} file(s)", stats.files_skipped));
    }

    formatter.detail("Load time", &format!("{:.2}s", stats.load_time.as_secs_f64()));
    formatter.detail("Merge time", &format!("{:.2}s", stats.merge_time.as_secs_f64()));
    formatter.info(&format!(
        "Merged {} file(s) ({}) into {} pages",
        stats.files_merged,
        stats.format_input_size(),
        stats.total_pages
    ));
}

/// Report an edit result and any per-layer diagnostics.
pub fn display_edit_outcome(formatter: &OutputFormatter, outcome: &EditOutcome, output: &Path) {
    formatter.diagnostics(&outcome.diagnostics);
    formatter.success(&format!(
        "Wrote {} ({} pages, {})",
        output.display(),
        outcome.page_count,
        format_file_size(outcome.bytes.len() as u64)
    ));
}
