//! javelin - merge, convert, edit and annotate PDF documents.
//!
//! Every document operation is recorded in the task log: once when it
//! starts and once when it finishes.

mod cli;

use std::future::Future;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LayerArgs};
use javelin::analyze::TextAnalyzer;
use javelin::config::{CompressionLevel, Config, OverwriteMode};
use javelin::convert::ImageConverter;
use javelin::edit::{AnnotationLayer, CompositeOptions, DirectiveSet, EditOptions, EditPipeline};
use javelin::error::{JavelinError, Result};
use javelin::geometry::CanvasSize;
use javelin::io::{PdfReader, PdfWriter, read_file};
use javelin::merge::{MergeOptions, Merger};
use javelin::output::{
    OutputFormatter, display_edit_outcome, display_merge_statistics, display_validation_summary,
};
use javelin::task::{JsonlTaskStore, TaskId, TaskRecord, TaskStore, TaskType};
use javelin::utils::{collect_paths_for_patterns, file_stem_or, format_file_size};
use javelin::validation::Validator;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(exit_code(&err));
    }
}

/// Install the log subscriber. `JAVELIN_LOG` overrides the level flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "javelin=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JAVELIN_LOG").unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit code of the innermost library error, or 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<JavelinError>())
        .map_or(1, JavelinError::exit_code)
}

/// Main application logic.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.to_config()?;
    let formatter = OutputFormatter::from_config(&config);
    let store = config.task_log.as_ref().map(JsonlTaskStore::new);

    if let Command::Tasks { id, json } = &cli.command {
        return show_tasks(store.as_ref(), id.as_deref(), *json, &formatter).await;
    }

    if let Command::Analyze { input, page, json } = &cli.command {
        return show_text(input, *page, *json, &formatter).await;
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(JavelinError::from)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let session = Session {
        config,
        formatter,
        store,
    };

    let output = match &cli.command {
        Command::Merge { inputs, output } => session.merge(inputs, output.as_deref()).await?,
        Command::Img2pdf {
            inputs,
            output,
            separate,
            dpi,
        } => {
            session
                .img2pdf(inputs, output.as_deref(), *separate, *dpi)
                .await?
        }
        Command::Edit {
            input,
            directives,
            output,
        } => session.edit(input, directives, output.as_deref()).await?,
        Command::Flatten {
            input,
            layers,
            directives,
            layout,
            output,
        } => {
            session
                .flatten(input, layers, directives.as_deref(), layout, output.as_deref())
                .await?
        }
        Command::Compress { input, output } => session.compress(input, output.as_deref()).await?,
        Command::Tasks { .. } | Command::Analyze { .. } => return Ok(()),
    };

    debug!(output = %output.display(), "Operation finished");
    Ok(())
}

/// Everything one operation needs.
struct Session {
    config: Config,
    formatter: OutputFormatter,
    store: Option<JsonlTaskStore>,
}

impl Session {
    async fn merge(&self, patterns: &[PathBuf], output: Option<&Path>) -> Result<PathBuf> {
        let output = self.config.output_path(output, "merged.pdf");

        self.track(TaskType::Merge, patterns, async {
            let inputs = collect_paths_for_patterns(patterns.iter().map(|p| p.to_string_lossy()))?;

            self.formatter.info("Validating input files...");
            let summary = Validator::new()
                .validate_files(&inputs, self.config.continue_on_error)
                .await?;
            display_validation_summary(&self.formatter, &summary);

            self.prepare_output(&output).await?;

            self.formatter
                .info(&format!("Merging {} file(s)...", inputs.len()));
            let options = MergeOptions {
                compression: self.config.compression,
                continue_on_error: self.config.continue_on_error,
                jobs: self.config.jobs,
            };
            let result = Merger::new().merge(&inputs, &options).await?;
            display_merge_statistics(&self.formatter, &result.statistics);

            // already compressed by the merger
            let stats = PdfWriter::with_compression(CompressionLevel::None)
                .save_with_stats(&result.document, &output)
                .await?;

            self.formatter.success(&format!(
                "Wrote {} ({} pages, {})",
                output.display(),
                result.statistics.total_pages,
                stats.format_file_size()
            ));
            Ok(output)
        })
        .await
    }

    async fn img2pdf(
        &self,
        inputs: &[PathBuf],
        output: Option<&Path>,
        separate: bool,
        dpi: f32,
    ) -> Result<PathBuf> {
        let converter = ImageConverter::new()
            .with_dpi(dpi)
            .with_compression(self.config.compression);

        self.track(TaskType::Img2Pdf, inputs, async {
            if separate {
                let written = converter
                    .convert_separately(inputs, &self.config.output_dir)
                    .await?;
                for (index, path) in written.iter().enumerate() {
                    self.formatter
                        .list_item(index + 1, &path.display().to_string());
                }
                self.formatter.success(&format!(
                    "Wrote {} PDF(s) to {}",
                    written.len(),
                    self.config.output_dir.display()
                ));
                return Ok(self.config.output_dir.clone());
            }

            let output = self.config.output_path(output, "images.pdf");
            self.prepare_output(&output).await?;

            let doc = converter.convert(inputs).await?;
            let stats = PdfWriter::with_compression(self.config.compression)
                .save_with_stats(&doc, &output)
                .await?;

            self.formatter.success(&format!(
                "Wrote {} ({} pages, {})",
                output.display(),
                inputs.len(),
                stats.format_file_size()
            ));
            Ok(output)
        })
        .await
    }

    async fn edit(&self, input: &Path, directives: &str, output: Option<&Path>) -> Result<PathBuf> {
        let output = self.config.output_path(
            output,
            &format!("{}_edited.pdf", file_stem_or(input, "document")),
        );

        self.track(TaskType::EditPdf, &[input.to_path_buf()], async {
            let directives = DirectiveSet::from_json(&load_payload(directives).await?)?;
            self.prepare_output(&output).await?;

            let outcome = self
                .pipeline(None)
                .run_to_file(input, &output, Some(&directives), None)
                .await?;
            display_edit_outcome(&self.formatter, &outcome, &output);
            Ok(output)
        })
        .await
    }

    async fn flatten(
        &self,
        input: &Path,
        layers: &str,
        directives: Option<&str>,
        layout: &LayerArgs,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        let output = self.config.output_path(
            output,
            &format!("{}_annotated.pdf", file_stem_or(input, "document")),
        );

        self.track(TaskType::Flatten, &[input.to_path_buf()], async {
            let canvas = layout.canvas_size()?;
            let layers = AnnotationLayer::list_from_json(&load_payload(layers).await?)?;
            let directives = match directives {
                Some(raw) => Some(DirectiveSet::from_json(&load_payload(raw).await?)?),
                None => None,
            };
            self.prepare_output(&output).await?;

            self.formatter
                .debug(&format!("Drawing {} layer(s)", layers.len()));
            let outcome = self
                .pipeline(canvas)
                .run_to_file(input, &output, directives.as_ref(), Some(&layers))
                .await?;
            display_edit_outcome(&self.formatter, &outcome, &output);
            Ok(output)
        })
        .await
    }

    async fn compress(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let output = self.config.output_path(
            output,
            &format!("{}_compressed.pdf", file_stem_or(input, "document")),
        );

        self.track(TaskType::Compress, &[input.to_path_buf()], async {
            let loaded = PdfReader::new().load(input).await?;
            self.prepare_output(&output).await?;

            let stats = PdfWriter::with_compression(self.config.compression)
                .save_with_stats(&loaded.document, &output)
                .await?;

            self.formatter.detail("Pages", &loaded.page_count.to_string());
            self.formatter.detail(
                "Write time",
                &format!("{:.2}s", stats.write_time.as_secs_f64()),
            );
            self.formatter.success(&format!(
                "Wrote {} ({} -> {})",
                output.display(),
                format_file_size(loaded.file_size),
                stats.format_file_size()
            ));
            Ok(output)
        })
        .await
    }

    fn pipeline(&self, canvas: Option<CanvasSize>) -> EditPipeline {
        EditPipeline::new(EditOptions {
            compression: self.config.compression,
            composite: CompositeOptions {
                canvas,
                out_of_range: self.config.out_of_range,
            },
        })
    }

    /// Run `operation` as a recorded task.
    async fn track(
        &self,
        task_type: TaskType,
        inputs: &[PathBuf],
        operation: impl Future<Output = Result<PathBuf>>,
    ) -> Result<PathBuf> {
        let names = inputs
            .iter()
            .map(|p| {
                p.file_name()
                    .map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
            })
            .collect();

        let mut task = TaskRecord::new(task_type, names);
        task.start();
        self.record(&task).await;

        let result = operation.await;
        match &result {
            Ok(output) => task.succeed(output.clone()),
            Err(err) => task.fail_with(err),
        }
        self.record(&task).await;

        result
    }

    /// Append to the task log. A failing log never fails the operation.
    async fn record(&self, task: &TaskRecord) {
        if let Some(store) = &self.store
            && let Err(e) = store.record(task).await
        {
            warn!(task = %task.id, error = %e, "Failed to record task");
            self.formatter
                .warning(&format!("Could not update task log: {e}"));
        }
    }

    async fn prepare_output(&self, output: &Path) -> Result<()> {
        Validator::new()
            .validate_output(output, self.config.overwrite_mode)
            .await?;
        handle_output_overwrite(output, self.config.overwrite_mode, &self.formatter)
    }
}

/// Read an inline JSON payload, or the file it names when it starts with `@`.
async fn load_payload(raw: &str) -> Result<String> {
    let Some(path) = raw.strip_prefix('@') else {
        return Ok(raw.to_string());
    };

    let bytes = read_file(Path::new(path)).await?;
    String::from_utf8(bytes)
        .map_err(|e| JavelinError::invalid_directive(format!("{path} is not UTF-8: {e}")))
}

/// Handle output file overwrite scenarios.
fn handle_output_overwrite(
    output: &Path,
    mode: OverwriteMode,
    formatter: &OutputFormatter,
) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }

    match mode {
        OverwriteMode::Force => Ok(()),
        OverwriteMode::NoClobber => Err(JavelinError::output_exists(output.to_path_buf())),
        OverwriteMode::Prompt => {
            // nobody to ask
            if formatter.is_quiet() || !std::io::stdin().is_terminal() {
                return Err(JavelinError::output_exists(output.to_path_buf()));
            }

            formatter.warning(&format!("Output file already exists: {}", output.display()));

            print!("Overwrite? [y/N]: ");
            std::io::stdout().flush().ok();

            let mut response = String::new();
            std::io::stdin().read_line(&mut response)?;

            let response = response.trim().to_lowercase();
            if response == "y" || response == "yes" {
                Ok(())
            } else {
                Err(JavelinError::Cancelled)
            }
        }
    }
}

/// Print the text spans of one page.
async fn show_text(
    input: &Path,
    page: usize,
    json: bool,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let text = TextAnalyzer::new()
        .analyze_file(input, page)
        .await
        .with_context(|| format!("analyzing {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&text)?);
    } else {
        formatter.text_spans(&text);
    }

    Ok(())
}

/// Print the task log, or one task from it.
async fn show_tasks(
    store: Option<&JsonlTaskStore>,
    id: Option<&str>,
    json: bool,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let store = store.ok_or_else(|| JavelinError::invalid_config("Task log is disabled"))?;

    let tasks = match id {
        Some(raw) => {
            let id: TaskId = raw.parse()?;
            let task = store
                .get(id)
                .await
                .with_context(|| format!("reading {}", store.path().display()))?
                .with_context(|| format!("no task with id {id}"))?;
            vec![task]
        }
        None => store
            .list()
            .await
            .with_context(|| format!("reading {}", store.path().display()))?,
    };

    if json {
        for task in &tasks {
            println!("{}", serde_json::to_string(task)?);
        }
    } else {
        formatter.task_table(&tasks);
    }

    Ok(())
}
