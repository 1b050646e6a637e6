use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::EngineConfig,
    delivery::CompletionSink,
    error::EngineError,
    history::HistoryStore,
    queue::{QueuedTask, TaskQueue},
    runner::Runner,
    stats::{StatsRegistry, StatsSnapshot, SubmitterStats},
    store::TaskStore,
    task::Task,
    worker::{WorkerContext, spawn_worker_pool},
};

const MAX_SOURCE_BYTES: usize = 250_000;

/// Transport-supplied `is_privileged` hook gating system-wide views. The
/// core ships no policy of its own; the default lets everyone through.
pub type Authorizer = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The execution engine core: owns the task map, queue, history and stats,
/// and the worker pool draining the queue. Submission is fire-and-forget;
/// reads are snapshot-based and never block on execution.
///
/// Must be constructed inside a tokio runtime (workers are spawned from
/// `new`).
pub struct Engine {
    queue: TaskQueue,
    store: Arc<TaskStore>,
    history: Arc<HistoryStore>,
    stats: Arc<StatsRegistry>,
    authorizer: Authorizer,
}

impl Engine {
    pub fn new(
        config: &EngineConfig,
        runner: Arc<dyn Runner>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        let queue = TaskQueue::new(config.queue_capacity);
        let store = Arc::new(TaskStore::new());
        let history = Arc::new(HistoryStore::new(config.history_capacity));
        let stats = Arc::new(StatsRegistry::new());

        let ctx = Arc::new(WorkerContext {
            store: store.clone(),
            history: history.clone(),
            stats: stats.clone(),
            runner,
            sink,
            exec_timeout: config.exec_timeout,
            max_output_bytes: config.max_output_bytes,
        });
        spawn_worker_pool(config.worker_count, queue.receiver(), ctx);

        Self {
            queue,
            store,
            history,
            stats,
            authorizer: Arc::new(|_| true),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Registers a submission and returns its id without waiting for
    /// execution. Fails only on malformed input or a full queue.
    pub fn submit(
        &self,
        submitter_id: impl Into<String>,
        submitter_label: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Uuid, EngineError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(EngineError::InvalidSubmission(
                "source is empty".to_string(),
            ));
        }
        if source.len() > MAX_SOURCE_BYTES {
            return Err(EngineError::InvalidSubmission(
                "source too large".to_string(),
            ));
        }

        let task = Task::new(submitter_id.into(), submitter_label.into(), source);
        let id = task.id;
        let queued = QueuedTask {
            id,
            submitter_id: task.submitter_id.clone(),
            source: task.source.clone(),
            mode: task.mode,
        };

        self.store.insert(task);
        self.stats.submitted(&queued.submitter_id);
        if let Err(err) = self.queue.push(queued.clone()) {
            self.store.remove(&id);
            self.stats.submission_rejected(&queued.submitter_id);
            return Err(err);
        }
        tracing::debug!(task_id = %id, submitter = %queued.submitter_id, "task queued");
        Ok(id)
    }

    pub fn get_status(&self, id: &Uuid) -> Option<Task> {
        self.store.get(id)
    }

    /// Terminal tasks of one submitter, completion order, most recent last.
    pub fn recent_for_submitter(&self, submitter_id: &str, limit: usize) -> Vec<Task> {
        self.history.recent_for(submitter_id, limit)
    }

    pub fn submitter_stats(&self, submitter_id: &str) -> SubmitterStats {
        self.stats.for_submitter(submitter_id)
    }

    pub fn system_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// System-wide counters, gated by the transport's authorizer.
    pub fn system_stats_for(&self, caller: &str) -> Result<StatsSnapshot, EngineError> {
        self.authorize(caller)?;
        Ok(self.stats.snapshot())
    }

    /// Full cross-submitter history, gated by the transport's authorizer.
    pub fn recent_all_for(&self, caller: &str, limit: usize) -> Result<Vec<Task>, EngineError> {
        self.authorize(caller)?;
        Ok(self.history.recent(limit))
    }

    fn authorize(&self, caller: &str) -> Result<(), EngineError> {
        if (self.authorizer)(caller) {
            Ok(())
        } else {
            Err(EngineError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{delivery::NullSink, runner::ProcessRunner};

    fn engine() -> Engine {
        let config = EngineConfig::default();
        Engine::new(
            &config,
            Arc::new(ProcessRunner::from_config(&config)),
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let engine = engine();
        let err = engine.submit("u1", "alice", "   ").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSubmission(_)));
        assert_eq!(engine.system_stats().submitted, 0);
    }

    #[tokio::test]
    async fn oversized_submission_is_rejected() {
        let engine = engine();
        let big = "x".repeat(MAX_SOURCE_BYTES + 1);
        let err = engine.submit("u1", "alice", big).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSubmission(_)));
    }

    #[tokio::test]
    async fn authorizer_gates_system_views() {
        let engine = engine().with_authorizer(Arc::new(|caller| caller == "admin"));
        assert!(engine.system_stats_for("admin").is_ok());
        assert!(matches!(
            engine.system_stats_for("mallory"),
            Err(EngineError::Forbidden)
        ));
        assert!(matches!(
            engine.recent_all_for("mallory", 10),
            Err(EngineError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let engine = engine();
        assert!(engine.get_status(&Uuid::new_v4()).is_none());
    }
}
