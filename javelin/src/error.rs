//! Error types for javelin.
//!
//! Every fallible operation in the crate returns [`JavelinError`]. Errors carry
//! a stable, inspectable [`ErrorKind`] so that callers (the CLI, a web layer,
//! the task log) can translate them into exit codes, HTTP statuses or task
//! records without parsing messages.
//!
//! # Error Categories
//!
//! - **Input errors**: missing, unreadable, encrypted or non-PDF sources
//! - **Directive errors**: out-of-range pages, bad rotations, malformed payloads
//! - **Result errors**: every page dropped by resolution
//! - **Output errors**: serialization and write failures
//!
//! Per-layer compositing problems are *not* errors; they are reported as
//! [`Diagnostic`](crate::edit::Diagnostic) values alongside a successful result.

use std::io;
use std::path::PathBuf;

/// Result type alias for javelin operations.
pub type Result<T> = std::result::Result<T, JavelinError>;

/// Stable discriminant for [`JavelinError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or unreadable source document.
    InvalidInput,
    /// Out-of-range page, bad rotation or malformed request payload.
    InvalidDirective,
    /// Resolution dropped every page.
    EmptyResult,
    /// Output could not be serialized or written.
    SerializationFailure,
    /// Input is not in a format the operation accepts.
    UnsupportedFormat,
    /// Generic filesystem failure.
    IoFailure,
    /// Invalid configuration.
    InvalidConfig,
    /// No inputs were supplied.
    NoInputs,
    /// Output already exists and overwriting is not allowed.
    OutputExists,
    /// The user cancelled the operation.
    Cancelled,
}

impl ErrorKind {
    /// Short machine-friendly name, as stored in task records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidDirective => "invalid_directive",
            Self::EmptyResult => "empty_result",
            Self::SerializationFailure => "serialization_failure",
            Self::UnsupportedFormat => "unsupported_format",
            Self::IoFailure => "io_failure",
            Self::InvalidConfig => "invalid_config",
            Self::NoInputs => "no_inputs",
            Self::OutputExists => "output_exists",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for javelin operations.
#[derive(Debug, thiserror::Error)]
pub enum JavelinError {
    /// Input file was not found.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Input path exists but is not a regular file.
    #[error("Not a file: {}", path.display())]
    NotAFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Input file is not accessible.
    #[error("Cannot access file: {}\n  Reason: {source}", path.display())]
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The source document could not be parsed.
    #[error("Failed to load PDF: {origin}\n  Reason: {reason}")]
    InvalidInput {
        /// Where the document came from (a path or "memory").
        origin: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The source document is encrypted.
    #[error(
        "PDF is encrypted and cannot be processed: {origin}\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools"
    )]
    EncryptedPdf {
        /// Where the document came from.
        origin: String,
    },

    /// Input is not in an accepted format.
    #[error("Unsupported format: {origin}\n  Details: {details}")]
    UnsupportedFormat {
        /// Where the input came from.
        origin: String,
        /// What was expected.
        details: String,
    },

    /// A page directive or layer payload was rejected.
    #[error("Invalid directive: {message}")]
    InvalidDirective {
        /// What was wrong with the request.
        message: String,
    },

    /// Every page was dropped by resolution.
    #[error("No pages survive the requested edits (source had {source_pages} page(s))")]
    EmptyResult {
        /// Page count of the source document.
        source_pages: usize,
    },

    /// The output document could not be serialized.
    #[error("Failed to serialize PDF: {reason}")]
    SerializationFailure {
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to create the output file.
    #[error("Failed to create output file: {}\n  Reason: {source}", path.display())]
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to write the output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// No inputs were supplied.
    #[error("No input files specified")]
    NoInputs,

    /// Output file already exists and overwrite is not allowed.
    #[error(
        "Output file already exists: {}\n  \
         Use --force to overwrite or choose a different output path",
        path.display()
    )]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl From<serde_json::Error> for JavelinError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_directive(format!("malformed payload: {err}"))
    }
}

/// A blocking task that panicked or was cancelled is an I/O failure.
impl From<tokio::task::JoinError> for JavelinError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io {
            source: io::Error::other(err),
        }
    }
}

impl From<lopdf::Error> for JavelinError {
    fn from(err: lopdf::Error) -> Self {
        Self::invalid_input("document", err.to_string())
    }
}

impl JavelinError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Create an EncryptedPdf error.
    pub fn encrypted(origin: impl Into<String>) -> Self {
        Self::EncryptedPdf {
            origin: origin.into(),
        }
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(origin: impl Into<String>, details: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            origin: origin.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidDirective error.
    pub fn invalid_directive(message: impl Into<String>) -> Self {
        Self::InvalidDirective {
            message: message.into(),
        }
    }

    /// Create a SerializationFailure error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::SerializationFailure {
            reason: reason.into(),
        }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: PathBuf) -> Self {
        Self::OutputExists { path }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::NotAFile { .. }
            | Self::FileNotAccessible { .. }
            | Self::InvalidInput { .. }
            | Self::EncryptedPdf { .. } => ErrorKind::InvalidInput,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::InvalidDirective { .. } => ErrorKind::InvalidDirective,
            Self::EmptyResult { .. } => ErrorKind::EmptyResult,
            Self::SerializationFailure { .. }
            | Self::FailedToCreateOutput { .. }
            | Self::FailedToWrite { .. } => ErrorKind::SerializationFailure,
            Self::NoInputs => ErrorKind::NoInputs,
            Self::OutputExists { .. } => ErrorKind::OutputExists,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io { .. } => ErrorKind::IoFailure,
        }
    }

    /// Check if this error is recoverable in continue-on-error batch mode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::EncryptedPdf { .. } | Self::UnsupportedFormat { .. }
        )
    }

    /// Check if this error should stop all processing immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoInputs
                | Self::FailedToCreateOutput { .. }
                | Self::FailedToWrite { .. }
                | Self::SerializationFailure { .. }
                | Self::Cancelled
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidInput => 3,
            ErrorKind::UnsupportedFormat => 3,
            ErrorKind::InvalidDirective => 1,
            ErrorKind::EmptyResult => 6,
            ErrorKind::SerializationFailure => 5,
            ErrorKind::IoFailure => 5,
            ErrorKind::InvalidConfig => 1,
            ErrorKind::NoInputs => 1,
            ErrorKind::OutputExists => 4,
            ErrorKind::Cancelled => 130, // SIGINT convention
        }
    }
}
