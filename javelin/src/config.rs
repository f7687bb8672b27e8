//! Runtime configuration for javelin.
//!
//! There is no process-wide configuration: a [`Config`] is built once (the
//! CLI builds it from arguments and environment) and passed to whatever
//! needs it. It covers working directories, the task log location, output
//! compression, overwrite behavior and layer handling.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::edit::OutOfRangePolicy;
use crate::error::{JavelinError, Result};

/// Default directory for generated documents.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Default directory where uploaded inputs are staged.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default task log file name, relative to the output directory.
pub const DEFAULT_TASK_LOG: &str = "tasks.jsonl";

/// Compression level for output PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Write objects exactly as they are.
    None,
    /// Flate-compress content streams.
    #[default]
    Standard,
    /// Compress streams, drop unreachable objects and empty streams, renumber.
    Maximum,
}

impl FromStr for CompressionLevel {
    type Err = JavelinError;

    /// Parse `none`, `standard` or `maximum` (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "standard" => Ok(Self::Standard),
            "maximum" => Ok(Self::Maximum),
            _ => Err(JavelinError::invalid_config(format!(
                "Invalid compression level: {s}. Must be one of: none, standard, maximum"
            ))),
        }
    }
}

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Ask on an interactive terminal, refuse otherwise.
    #[default]
    Prompt,
    /// Always overwrite.
    Force,
    /// Never overwrite; fail if the file exists.
    NoClobber,
}

/// Settings shared by every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where staged inputs live.
    pub upload_dir: PathBuf,

    /// Where outputs are written when no explicit path is given.
    pub output_dir: PathBuf,

    /// JSON-lines task log; `None` disables task recording.
    pub task_log: Option<PathBuf>,

    /// Compression applied to every written PDF.
    pub compression: CompressionLevel,

    /// What to do when an output file already exists.
    pub overwrite_mode: OverwriteMode,

    /// Handling of layers that target missing pages.
    pub out_of_range: OutOfRangePolicy,

    /// Skip unreadable inputs in batch operations instead of failing.
    pub continue_on_error: bool,

    /// Parallel loads in batch operations (`None` = number of CPUs).
    pub jobs: Option<usize>,

    /// Verbose output.
    pub verbose: bool,

    /// Suppress non-error output.
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        let output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            task_log: Some(output_dir.join(DEFAULT_TASK_LOG)),
            output_dir,
            compression: CompressionLevel::default(),
            overwrite_mode: OverwriteMode::default(),
            out_of_range: OutOfRangePolicy::default(),
            continue_on_error: false,
            jobs: None,
            verbose: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::InvalidConfig`] if:
    /// - verbose and quiet are both set
    /// - the job count is zero
    /// - the output directory path is empty
    /// - the task log path is a directory
    pub fn validate(&self) -> Result<()> {
        if self.verbose && self.quiet {
            return Err(JavelinError::invalid_config(
                "Cannot use both --verbose and --quiet",
            ));
        }

        if self.jobs == Some(0) {
            return Err(JavelinError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(JavelinError::invalid_config(
                "Output directory cannot be empty",
            ));
        }

        if let Some(log) = &self.task_log
            && log.is_dir()
        {
            return Err(JavelinError::invalid_config(format!(
                "Task log path is a directory: {}",
                log.display()
            )));
        }

        Ok(())
    }

    /// Effective number of parallel loads.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Whether informational output should be printed.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    /// Resolve an output path: explicit paths win, otherwise `file_name`
    /// inside the output directory.
    pub fn output_path(&self, explicit: Option<&Path>, file_name: &str) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_dir.join(file_name))
    }
}
