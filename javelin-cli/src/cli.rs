//! CLI argument parsing for javelin.
//!
//! Global flags configure every operation; each document operation is a
//! subcommand. [`Cli::to_config`] turns the global flags into a validated
//! [`Config`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use javelin::config::{CompressionLevel, Config, DEFAULT_TASK_LOG, OverwriteMode};
use javelin::edit::OutOfRangePolicy;
use javelin::error::{JavelinError, Result};
use javelin::geometry::CanvasSize;

/// Merge, convert, edit and annotate PDF documents.
///
/// Every operation is recorded in a JSON-lines task log inside the output
/// directory unless --no-task-log is given.
#[derive(Parser, Debug)]
#[command(name = "javelin")]
#[command(version)]
#[command(about = "Merge, convert, edit and annotate PDF documents", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory for generated documents
    #[arg(long, global = true, value_name = "DIR", env = "JAVELIN_OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Directory where uploaded inputs are staged
    #[arg(long, global = true, value_name = "DIR", env = "JAVELIN_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Task log file (default: tasks.jsonl inside the output directory)
    #[arg(long, global = true, value_name = "FILE", env = "JAVELIN_TASK_LOG")]
    pub task_log: Option<PathBuf>,

    /// Do not record tasks
    #[arg(long, global = true, conflicts_with = "task_log")]
    pub no_task_log: bool,

    /// Compression level for written PDFs
    ///
    /// - none: write objects as they are
    /// - standard: compress content streams (default)
    /// - maximum: also drop unreachable objects and renumber
    #[arg(short, long, global = true, value_name = "LEVEL", default_value = "standard")]
    #[arg(value_parser = ["none", "standard", "maximum"])]
    pub compression: String,

    /// Overwrite existing output files without confirmation
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Never overwrite existing output files
    #[arg(long, global = true, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Skip unreadable inputs instead of failing
    #[arg(long, global = true)]
    pub continue_on_error: bool,

    /// Number of parallel loads (default: number of CPU cores)
    #[arg(short, long, global = true, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Document operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge PDF files into one document, in the order given
    ///
    /// Examples:
    ///   javelin merge a.pdf b.pdf -o merged.pdf
    ///   javelin merge 'chapter*.pdf'
    Merge {
        /// Input PDF files or glob patterns
        #[arg(required = true, value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// Output file (default: merged.pdf in the output directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Pack images into a PDF, one page per image
    Img2pdf {
        /// Input images (jpg, jpeg, png, gif, bmp, tiff, webp)
        #[arg(required = true, value_name = "IMAGE")]
        inputs: Vec<PathBuf>,

        /// Output file (default: images.pdf in the output directory)
        #[arg(short, long, value_name = "FILE", conflicts_with = "separate")]
        output: Option<PathBuf>,

        /// Write one PDF per image into the output directory
        #[arg(long)]
        separate: bool,

        /// Image resolution used to size pages
        #[arg(long, value_name = "DPI", default_value_t = 100.0)]
        dpi: f32,
    },

    /// Reorder, rotate and delete pages
    ///
    /// Directives are JSON, given inline or as @file:
    ///   {"mode":"sparse","changes":[{"pageNum":2,"deleted":true}]}
    ///   {"mode":"ordered","pages":[{"index":1},{"index":0,"rotate":90}]}
    Edit {
        /// Input PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page directives (JSON or @file)
        #[arg(short, long, value_name = "JSON")]
        directives: String,

        /// Output file (default: <stem>_edited.pdf in the output directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Draw annotation layers onto pages
    Flatten {
        /// Input PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Annotation layers (JSON array or @file)
        #[arg(short, long, value_name = "JSON")]
        layers: String,

        /// Page directives applied before the layers (JSON or @file)
        #[arg(short, long, value_name = "JSON")]
        directives: Option<String>,

        #[command(flatten)]
        layout: LayerArgs,

        /// Output file (default: <stem>_annotated.pdf in the output directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rewrite a PDF with a compression level
    Compress {
        /// Input PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: <stem>_compressed.pdf in the output directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List positioned text spans on a page
    ///
    /// Positions are canvas coordinates of the visible page: origin top-left,
    /// Y down, in points. They match the coordinates flatten layers use.
    Analyze {
        /// Input PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page to analyze (1-based)
        #[arg(short, long, value_name = "N", default_value_t = 1)]
        page: usize,

        /// Print spans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recorded tasks
    Tasks {
        /// Show a single task
        #[arg(value_name = "ID")]
        id: Option<String>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

/// How layer coordinates map onto pages.
#[derive(Args, Debug, Clone, Default)]
pub struct LayerArgs {
    /// Size of the editor canvas the layers were drawn on, e.g. 1224x1584
    #[arg(long, value_name = "WxH")]
    pub canvas: Option<String>,

    /// What to do with layers that target a missing page
    #[arg(long, value_name = "POLICY", default_value = "skip")]
    #[arg(value_parser = ["skip", "reject"])]
    pub out_of_range: String,
}

impl LayerArgs {
    /// Parsed canvas size, if given.
    ///
    /// # Errors
    ///
    /// Returns an error unless the value is `WIDTHxHEIGHT` with positive sides.
    pub fn canvas_size(&self) -> Result<Option<CanvasSize>> {
        let Some(raw) = &self.canvas else {
            return Ok(None);
        };

        let invalid = || JavelinError::invalid_config(format!("Invalid canvas size: {raw}. Use WIDTHxHEIGHT"));
        let (width, height) = raw.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: f32 = width.trim().parse().map_err(|_| invalid())?;
        let height: f32 = height.trim().parse().map_err(|_| invalid())?;
        if !(width > 0.0 && height > 0.0) {
            return Err(invalid());
        }

        Ok(Some(CanvasSize { width, height }))
    }

    /// Parsed out-of-range policy.
    pub fn policy(&self) -> Result<OutOfRangePolicy> {
        OutOfRangePolicy::from_str(&self.out_of_range).map_err(JavelinError::invalid_config)
    }
}

impl Cli {
    /// Convert the global flags into a validated Config.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression level is invalid, the job count is
    /// zero, or validation of the resulting configuration fails.
    pub fn to_config(&self) -> Result<Config> {
        let compression = CompressionLevel::from_str(&self.compression)?;

        let overwrite_mode = if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        };

        let task_log = if self.no_task_log {
            None
        } else {
            Some(
                self.task_log
                    .clone()
                    .unwrap_or_else(|| self.output_dir.join(DEFAULT_TASK_LOG)),
            )
        };

        let out_of_range = match &self.command {
            Command::Flatten { layout, .. } => layout.policy()?,
            _ => OutOfRangePolicy::default(),
        };

        let config = Config {
            upload_dir: self.upload_dir.clone(),
            output_dir: self.output_dir.clone(),
            task_log,
            compression,
            overwrite_mode,
            out_of_range,
            continue_on_error: self.continue_on_error,
            jobs: self.jobs,
            verbose: self.verbose,
            quiet: self.quiet,
        };

        config.validate()?;
        Ok(config)
    }
}
