//! Task records and the append-only task log.
//!
//! Every operation run through the CLI is tracked as a [`TaskRecord`] that
//! moves `pending -> processing -> success | failed`. [`JsonlTaskStore`]
//! appends one JSON line per state change; when reading, the latest line
//! for an id wins. Document bytes are never stored, only the output path.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::task::{JsonlTaskStore, TaskRecord, TaskStore, TaskType};
//!
//! # async fn example() -> javelin::Result<()> {
//! let store = JsonlTaskStore::new("outputs/tasks.jsonl");
//! let mut task = TaskRecord::new(TaskType::Merge, vec!["a.pdf".into(), "b.pdf".into()]);
//! task.start();
//! store.record(&task).await?;
//! task.succeed("outputs/merged.pdf");
//! store.record(&task).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, JavelinError, Result};

/// Unique identifier of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = JavelinError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| JavelinError::invalid_config(format!("Invalid task id '{s}': {e}")))
    }
}

/// Kind of operation a task ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Merge PDFs.
    Merge,
    /// Images to PDF.
    #[serde(rename = "img2pdf")]
    Img2Pdf,
    /// Page reorder/rotate/delete.
    EditPdf,
    /// Annotation flattening.
    Flatten,
    /// Recompression.
    Compress,
}

impl TaskType {
    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Img2Pdf => "img2pdf",
            Self::EditPdf => "edit_pdf",
            Self::Flatten => "flatten",
            Self::Compress => "compress",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not started.
    #[default]
    Pending,
    /// Running.
    Processing,
    /// Finished with an output.
    Success,
    /// Finished with an error.
    Failed,
}

impl TaskStatus {
    /// Whether the task has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        })
    }
}

/// One tracked operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task id.
    pub id: TaskId,
    /// Operation kind.
    pub task_type: TaskType,
    /// Current state.
    pub status: TaskStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set once the task succeeds or fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Input file names, in the order given.
    #[serde(default)]
    pub original_filenames: Vec<String>,
    /// Written output, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Error kind, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Error message, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskRecord {
    /// A new pending task.
    pub fn new(task_type: TaskType, original_filenames: Vec<String>) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            original_filenames,
            output_path: None,
            error_kind: None,
            error_message: None,
        }
    }

    /// Mark as running.
    pub fn start(&mut self) {
        self.status = TaskStatus::Processing;
    }

    /// Mark as finished successfully with `output`.
    pub fn succeed(&mut self, output: impl Into<PathBuf>) {
        self.status = TaskStatus::Success;
        self.finished_at = Some(Utc::now());
        self.output_path = Some(output.into());
        self.error_kind = None;
        self.error_message = None;
    }

    /// Mark as failed with a free-form message.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
    }

    /// Mark as failed, capturing the error's kind and message.
    pub fn fail_with(&mut self, error: &JavelinError) {
        self.fail(error.kind(), error.to_string());
    }

    /// A finished, failed task for `error`.
    pub fn from_error(task_type: TaskType, original_filenames: Vec<String>, error: &JavelinError) -> Self {
        let mut record = Self::new(task_type, original_filenames);
        record.fail_with(error);
        record
    }
}

/// Persistence for task records.
pub trait TaskStore: Sync {
    /// Persist the current state of `task`.
    fn record(&self, task: &TaskRecord) -> impl Future<Output = Result<()>> + Send;

    /// All tasks, newest first.
    fn list(&self) -> impl Future<Output = Result<Vec<TaskRecord>>> + Send;

    /// The latest state of one task.
    fn get(&self, id: TaskId) -> impl Future<Output = Result<Option<TaskRecord>>> + Send {
        async move { Ok(self.list().await?.into_iter().find(|t| t.id == id)) }
    }
}

/// JSON-lines task log.
#[derive(Debug, Clone)]
pub struct JsonlTaskStore {
    path: PathBuf,
}

impl JsonlTaskStore {
    /// A store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for JsonlTaskStore {
    #[instrument(skip_all, fields(task = %task.id, status = %task.status))]
    async fn record(&self, task: &TaskRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(task)
            .map_err(|e| JavelinError::serialization(format!("task record: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!("Recorded task");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TaskRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut order = Vec::new();
        let mut latest: HashMap<TaskId, TaskRecord> = HashMap::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TaskRecord>(line) {
                Ok(record) => {
                    if !latest.contains_key(&record.id) {
                        order.push(record.id);
                    }
                    latest.insert(record.id, record);
                }
                Err(e) => warn!(line = number + 1, error = %e, "Skipping unreadable task line"),
            }
        }

        let mut tasks: Vec<TaskRecord> = order.into_iter().filter_map(|id| latest.remove(&id)).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }
}
