use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),
    #[error("queue is full")]
    QueueFull,
    #[error("forbidden")]
    Forbidden,
}

/// Runner-side failures that prevent a verdict on the submission itself.
/// A non-zero exit or a timeout is not an error here; those are reported
/// through `RunResult`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed writing source file: {0}")]
    SourceFile(#[source] std::io::Error),
    #[error("process wait failed: {0}")]
    Wait(#[source] std::io::Error),
}
