use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use tokio::{io::AsyncReadExt, process::Command};

use crate::{
    config::EngineConfig,
    error::RunnerError,
    runner::{RunResult, RunSpec, Runner},
    task::{ExecMode, RunExit, SHELL_SENTINEL},
};

/// Runs submissions as plain OS processes: shell submissions through
/// `shell -c`, interpreted submissions through a temp source file handed to
/// the interpreter. Both modes share the same timeout and process-group
/// termination discipline.
pub struct ProcessRunner {
    shell: String,
    interpreter: String,
    grace: Duration,
}

impl ProcessRunner {
    pub fn new(shell: String, interpreter: String, grace: Duration) -> Self {
        Self {
            shell,
            interpreter,
            grace,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.shell.clone(),
            config.interpreter.clone(),
            config.kill_grace,
        )
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, spec: RunSpec) -> Result<RunResult, RunnerError> {
        let started = Instant::now();

        let (mut cmd, _source_guard) = match spec.mode {
            ExecMode::Shell => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(shell_command(&spec.source));
                (cmd, None)
            }
            ExecMode::Interpreted => {
                let guard = TempSource::create(spec.id, &spec.source).await?;
                let mut cmd = Command::new(&self.interpreter);
                cmd.arg(guard.path());
                (cmd, Some(guard))
            }
        };

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Own process group, so a timeout kill reaches the child's
        // descendants too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = spec.max_output_bytes;
        let stdout_task = tokio::spawn(async move {
            match stdout {
                Some(pipe) => read_limited(pipe, limit).await,
                None => Vec::new(),
            }
        });
        let stderr_task = tokio::spawn(async move {
            match stderr {
                Some(pipe) => read_limited(pipe, limit).await,
                None => Vec::new(),
            }
        });

        let wait_result = tokio::time::timeout(spec.timeout, child.wait()).await;

        let exit = match wait_result {
            Ok(Ok(status)) => RunExit::Exited(status.code().unwrap_or(-1)),
            Ok(Err(err)) => return Err(RunnerError::Wait(err)),
            Err(_) => {
                kill_process_group(&child);
                if tokio::time::timeout(self.grace, child.wait()).await.is_err() {
                    let _ = child.kill().await;
                }
                RunExit::TimedOut
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let duration_ms = started.elapsed().as_millis() as u64;

        if exit == RunExit::TimedOut {
            // Partial output is not a result; the verdict is the timeout.
            return Ok(RunResult {
                stdout: String::new(),
                stderr: format!(
                    "process killed after exceeding the {} ms budget",
                    spec.timeout.as_millis()
                ),
                exit,
                duration_ms,
            });
        }

        Ok(RunResult {
            stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
            stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
            exit,
            duration_ms,
        })
    }
}

/// Shell submissions carry a leading sentinel; everything after it is the
/// command line.
fn shell_command(source: &str) -> String {
    source
        .trim_start()
        .strip_prefix(SHELL_SENTINEL)
        .unwrap_or(source)
        .trim()
        .to_string()
}

#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        // process_group(0) made the child the group leader.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

/// Scoped temp source file: created for one submission, removed on every
/// exit path via Drop. A removal failure is logged, never propagated over
/// the run result.
struct TempSource {
    path: PathBuf,
}

impl TempSource {
    async fn create(id: uuid::Uuid, source: &str) -> Result<Self, RunnerError> {
        let path = std::env::temp_dir().join(format!(
            "codeexec-{}-{}.py",
            id.as_simple(),
            now_nanos()
        ));
        tokio::fs::write(&path, source.as_bytes())
            .await
            .map_err(RunnerError::SourceFile)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSource {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "temp source cleanup failed");
            }
        }
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

async fn read_limited<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut out = Vec::with_capacity(limit.min(8192));
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if out.len() < limit {
                    let remaining = limit - out.len();
                    out.extend_from_slice(&chunk[..remaining.min(n)]);
                }
            }
            Err(_) => break,
        }
    }
    out
}
