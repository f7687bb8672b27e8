//! Message formatting for the terminal.
//!
//! Info and success messages are suppressed in quiet mode; warnings and
//! errors always print; debug lines print only in verbose mode.
//!
//! ```
//! use javelin::output::formatter::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Loading inputs...");
//! formatter.success("Wrote outputs/merged.pdf");
//! ```

use std::io::IsTerminal;

use crate::analyze::{PageText, TextSpan};
use crate::config::Config;
use crate::edit::Diagnostic;
use crate::task::TaskRecord;

/// Level of an output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Plain information.
    Info,
    /// Operation completed.
    Success,
    /// Something was skipped or degraded.
    Warning,
    /// Operation failed.
    Error,
    /// Verbose detail.
    Debug,
}

impl MessageLevel {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "✓ ",
            Self::Warning => "⚠ ",
            Self::Error => "✗ ",
            Self::Debug => "→ ",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "\x1b[32m",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
            Self::Debug => "\x1b[36m",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// Render a message with its level prefix, optionally in color.
pub fn format_message(level: MessageLevel, message: &str, colored: bool) -> String {
    let color = level.color();
    if colored && !color.is_empty() {
        format!("{color}{}{message}\x1b[0m", level.prefix())
    } else {
        format!("{}{message}", level.prefix())
    }
}

/// Output formatter with configurable verbosity.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
}

impl OutputFormatter {
    /// Create a formatter. Color is used when stdout is a terminal.
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: std::io::stdout().is_terminal() && std::env::var_os("TERM").is_some(),
        }
    }

    /// Create a formatter from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quiet, config.verbose)
    }

    /// Print an informational message.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.emit(MessageLevel::Info, message);
        }
    }

    /// Print a success message.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.emit(MessageLevel::Success, message);
        }
    }

    /// Print a warning, even in quiet mode.
    pub fn warning(&self, message: &str) {
        self.emit(MessageLevel::Warning, message);
    }

    /// Print an error, even in quiet mode.
    pub fn error(&self, message: &str) {
        self.emit(MessageLevel::Error, message);
    }

    /// Print a verbose-only message.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.emit(MessageLevel::Debug, message);
        }
    }

    /// Print a `label: value` line in verbose mode.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            println!("  {label}: {value}");
        }
    }

    /// Print a numbered list item.
    pub fn list_item(&self, index: usize, message: &str) {
        if !self.quiet {
            println!("  {index}. {message}");
        }
    }

    /// Report per-layer diagnostics as warnings.
    pub fn diagnostics(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            self.warning(&diagnostic.to_string());
        }
    }

    /// Print the task log as a table, newest first.
    pub fn task_table(&self, tasks: &[TaskRecord]) {
        if self.quiet {
            return;
        }
        if tasks.is_empty() {
            println!("No tasks recorded");
            return;
        }
        for task in tasks {
            println!("{}", task_row(task));
        }
    }

    /// Print the text spans of one page.
    pub fn text_spans(&self, page: &PageText) {
        if self.quiet {
            return;
        }
        println!("Page {} of {}", page.page_num, page.page_count);
        if page.spans.is_empty() {
            println!("No text found");
            return;
        }
        for span in &page.spans {
            println!("{}", span_row(span));
        }
    }

    /// Whether info output is shown.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    /// Whether verbose output is shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether quiet mode is on.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn emit(&self, level: MessageLevel, message: &str) {
        let line = format_message(level, message, self.colored);
        if level.to_stderr() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// One task as a table row: id, type, status, creation time, output or error.
pub fn task_row(task: &TaskRecord) -> String {
    let detail = match (&task.output_path, &task.error_message) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(message)) => message.lines().next().unwrap_or_default().to_string(),
        (None, None) => task.original_filenames.join(", "),
    };
    format!(
        "{}  {:<9} {:<10} {}  {}",
        task.id,
        task.task_type,
        task.status,
        task.created_at.format("%Y-%m-%d %H:%M"),
        detail
    )
}

/// One text span as a table row: position, size, font, color and text.
pub fn span_row(span: &TextSpan) -> String {
    format!(
        "{:>7.1} {:>7.1}  {:>5.1}pt  {:<16} {}  {:?}",
        span.origin[0], span.origin[1], span.size, span.font, span.color, span.text
    )
}
