use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::task::{RunExit, Task};

/// Sentinel for a clean run that printed nothing; an empty string would be
/// ambiguous with "did not run".
pub const NO_OUTPUT: &str = "(no output)";

pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Terminal-result notification owned by the transport layer. The worker
/// invokes it exactly once per terminal task; a sink failure is logged and
/// never rolls back the task's state.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn deliver(&self, task: &Task) -> anyhow::Result<()>;
}

/// Ships terminal snapshots over an unbounded channel. The demo binary and
/// the integration tests consume the receiving end.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Task>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl CompletionSink for ChannelSink {
    async fn deliver(&self, task: &Task) -> anyhow::Result<()> {
        self.sender
            .send(task.clone())
            .map_err(|_| anyhow::anyhow!("result receiver dropped"))
    }
}

/// Swallows results; for callers that only poll `get_status`.
pub struct NullSink;

#[async_trait]
impl CompletionSink for NullSink {
    async fn deliver(&self, _task: &Task) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Renders one terminal task as a bounded text blob: headline naming one of
/// the four outcomes, then stdout, then stderr.
pub fn format_outcome(task: &Task, max_len: usize) -> String {
    let Some(output) = task.output.as_ref() else {
        let diagnostic = task.error.as_deref().unwrap_or("no result recorded");
        return bounded(format!("could not start: {diagnostic}"), max_len);
    };

    let headline = match output.exit {
        RunExit::Exited(0) => "exit 0".to_string(),
        RunExit::Exited(code) => format!("exit {code}"),
        RunExit::TimedOut => format!("timed out after {} ms", output.duration_ms),
        RunExit::SpawnFailed => "could not start".to_string(),
    };

    let body = output.combined();
    let text = if body.trim().is_empty() {
        match output.exit {
            RunExit::Exited(0) => format!("{headline}\n{NO_OUTPUT}"),
            _ => headline,
        }
    } else {
        format!("{headline}\n{body}")
    };

    bounded(text, max_len)
}

fn bounded(mut text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len.saturating_sub(TRUNCATION_MARKER.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
    text
}
