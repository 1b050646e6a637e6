pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod history;
pub mod queue;
pub mod runner;
pub mod stats;
pub mod store;
pub mod task;
pub mod worker;

pub use config::EngineConfig;
pub use delivery::{ChannelSink, CompletionSink, NullSink, format_outcome};
pub use engine::{Authorizer, Engine};
pub use error::{EngineError, RunnerError};
pub use history::HistoryStore;
pub use runner::{ProcessRunner, RunResult, RunSpec, Runner};
pub use stats::{StatsSnapshot, SubmitterStats};
pub use task::{ExecMode, RunExit, Task, TaskOutput, TaskStatus};
