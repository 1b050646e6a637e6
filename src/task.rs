use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Leading character that switches a submission into shell mode.
pub const SHELL_SENTINEL: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Shell,
    Interpreted,
}

impl ExecMode {
    /// Decided once at task creation from the source prefix, never
    /// re-inspected afterwards.
    pub fn detect(source: &str) -> Self {
        if source.trim_start().starts_with(SHELL_SENTINEL) {
            Self::Shell
        } else {
            Self::Interpreted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// How the child process ended. The four user-visible outcomes (clean exit,
/// non-zero exit, timeout, spawn failure) stay distinguishable end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum RunExit {
    Exited(i32),
    TimedOut,
    SpawnFailed,
}

impl RunExit {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: RunExit,
    pub duration_ms: u64,
}

impl TaskOutput {
    /// Stdout first, then stderr, for transports that want one blob.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub submitter_id: String,
    pub submitter_label: String,
    pub source: String,
    pub mode: ExecMode,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output: Option<TaskOutput>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(submitter_id: String, submitter_label: String, source: String) -> Self {
        let mode = ExecMode::detect(&source);
        Self {
            id: Uuid::new_v4(),
            submitter_id,
            submitter_label,
            source,
            mode,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            output: None,
            error: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.output.as_ref().map(|o| o.duration_ms).unwrap_or(0)
    }
}
