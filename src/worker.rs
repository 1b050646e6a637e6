use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, mpsc::Receiver};

use crate::{
    delivery::CompletionSink,
    history::{HistoryStore, RecordOutcome},
    queue::QueuedTask,
    runner::{RunSpec, Runner},
    stats::StatsRegistry,
    store::TaskStore,
    task::{RunExit, TaskOutput, TaskStatus},
};

/// Everything a worker needs besides the queue itself.
pub struct WorkerContext {
    pub store: Arc<TaskStore>,
    pub history: Arc<HistoryStore>,
    pub stats: Arc<StatsRegistry>,
    pub runner: Arc<dyn Runner>,
    pub sink: Arc<dyn CompletionSink>,
    pub exec_timeout: Duration,
    pub max_output_bytes: usize,
}

pub fn spawn_worker_pool(
    workers: usize,
    receiver: Arc<Mutex<Receiver<QueuedTask>>>,
    ctx: Arc<WorkerContext>,
) {
    for worker_id in 0..workers.max(1) {
        let receiver = receiver.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            worker_loop(worker_id, receiver, ctx).await;
        });
    }
}

/// Drains the queue one claimed task at a time. A misbehaving submission is
/// captured into its task record; the loop itself never dies because of one.
async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<Receiver<QueuedTask>>>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        let queued = {
            let mut locked = receiver.lock().await;
            locked.recv().await
        };
        let Some(queued) = queued else {
            tracing::info!(worker_id, "task queue closed, worker exiting");
            break;
        };

        tracing::info!(worker_id, task_id = %queued.id, mode = ?queued.mode, "starting task");
        ctx.stats.started();
        ctx.store.mark_running(queued.id);

        let spec = RunSpec {
            id: queued.id,
            source: queued.source,
            mode: queued.mode,
            timeout: ctx.exec_timeout,
            max_output_bytes: ctx.max_output_bytes,
        };
        let run = ctx.runner.run(spec).await;

        let (status, output, error) = match run {
            Ok(result) => {
                let status = if result.exit.is_success() {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                let error = match result.exit {
                    RunExit::TimedOut => Some("execution timed out".to_string()),
                    RunExit::Exited(code) if code != 0 && result.stderr.is_empty() => {
                        Some(format!("process exited with code {code}"))
                    }
                    _ => None,
                };
                let output = TaskOutput {
                    stdout: result.stdout,
                    stderr: result.stderr,
                    exit: result.exit,
                    duration_ms: result.duration_ms,
                };
                (status, Some(output), error)
            }
            Err(err) => {
                // Spawn/wait failures are captured into the task record,
                // never thrown across the dispatcher boundary.
                tracing::warn!(worker_id, task_id = %queued.id, error = %err, "runner failed");
                let output = TaskOutput {
                    stdout: String::new(),
                    stderr: err.to_string(),
                    exit: RunExit::SpawnFailed,
                    duration_ms: 0,
                };
                (TaskStatus::Failed, Some(output), Some(err.to_string()))
            }
        };

        let Some(snapshot) = ctx.store.mark_finished(queued.id, status, output, error) else {
            tracing::warn!(worker_id, task_id = %queued.id, "finished task vanished from store");
            continue;
        };

        let duration_ms = snapshot.duration_ms();
        match snapshot.status {
            TaskStatus::Completed => ctx.stats.succeeded(&queued.submitter_id, duration_ms),
            _ => {
                let timed_out = matches!(
                    snapshot.output.as_ref().map(|o| o.exit),
                    Some(RunExit::TimedOut)
                );
                ctx.stats.failed(&queued.submitter_id, duration_ms, timed_out);
            }
        }

        if let RecordOutcome::Recorded {
            evicted: Some(evicted),
        } = ctx.history.record(snapshot.clone())
        {
            ctx.store.remove(&evicted);
        }

        if let Err(err) = ctx.sink.deliver(&snapshot).await {
            tracing::warn!(task_id = %snapshot.id, error = %err, "result delivery failed");
        }

        tracing::info!(
            worker_id,
            task_id = %snapshot.id,
            status = ?snapshot.status,
            duration_ms,
            "task finished"
        );
    }
}
