mod process;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::RunnerError,
    task::{ExecMode, RunExit},
};

pub use process::ProcessRunner;

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub id: Uuid,
    pub source: String,
    pub mode: ExecMode,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit: RunExit,
    pub duration_ms: u64,
}

/// Spawns and supervises one child process per submission. A non-zero exit
/// or a timeout is a valid `RunResult`; `Err` means the verdict itself could
/// not be produced (spawn or wait failure).
#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, spec: RunSpec) -> Result<RunResult, RunnerError>;
}
