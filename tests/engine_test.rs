#![cfg(unix)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use codeexec::{
    ChannelSink, Engine, EngineConfig, ProcessRunner, RunExit, Task, TaskStatus,
};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

fn test_config() -> EngineConfig {
    EngineConfig {
        worker_count: 1,
        queue_capacity: 64,
        history_capacity: 100,
        exec_timeout: Duration::from_secs(10),
        kill_grace: Duration::from_millis(500),
        max_output_bytes: 40_000,
        interpreter: "/bin/sh".to_string(),
        shell: "/bin/sh".to_string(),
        log_level: "info".to_string(),
    }
}

fn engine_with(config: EngineConfig) -> (Engine, UnboundedReceiver<Task>) {
    let runner = Arc::new(ProcessRunner::from_config(&config));
    let (sink, results) = ChannelSink::new();
    (Engine::new(&config, runner, Arc::new(sink)), results)
}

async fn await_task(results: &mut UnboundedReceiver<Task>, id: Uuid) -> Task {
    loop {
        let task = results.recv().await.expect("engine dropped before result");
        if task.id == id {
            return task;
        }
    }
}

#[tokio::test]
async fn echo_completes_with_exact_stdout() {
    let (engine, mut results) = engine_with(test_config());
    let id = engine.submit("u1", "alice", "!echo hello").unwrap();

    let task = await_task(&mut results, id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    let output = task.output.as_ref().unwrap();
    assert_eq!(output.stdout, "hello\n");
    assert_eq!(output.stderr, "");
    assert_eq!(output.exit, RunExit::Exited(0));
    assert!(task.started_at.is_some());
    assert!(task.finished_at.is_some());

    // the published snapshot matches what was delivered
    let snapshot = engine.get_status(&id).unwrap();
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.output.unwrap().stdout, "hello\n");
}

#[tokio::test]
async fn submit_returns_before_the_task_is_terminal() {
    let (engine, mut results) = engine_with(test_config());
    let id = engine.submit("u1", "alice", "!sleep 1").unwrap();

    let early = engine.get_status(&id).unwrap();
    assert!(matches!(
        early.status,
        TaskStatus::Pending | TaskStatus::Running
    ));
    assert!(early.finished_at.is_none());

    let task = await_task(&mut results, id).await;
    assert!(task.status.is_terminal());
}

#[tokio::test]
async fn failing_child_yields_failed_with_stderr() {
    let (engine, mut results) = engine_with(test_config());
    // interpreted mode: the script goes through the temp source file
    let id = engine
        .submit("u1", "alice", "echo bad >&2\nexit 2")
        .unwrap();

    let task = await_task(&mut results, id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    let output = task.output.as_ref().unwrap();
    assert_eq!(output.exit, RunExit::Exited(2));
    assert!(!output.stderr.is_empty());
}

#[tokio::test]
async fn timeout_is_bounded_and_diagnosed() {
    let mut config = test_config();
    config.exec_timeout = Duration::from_millis(300);
    let (engine, mut results) = engine_with(config);

    let started = Instant::now();
    let id = engine.submit("u1", "alice", "!sleep 30").unwrap();
    let task = await_task(&mut results, id).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.output.as_ref().unwrap().exit, RunExit::TimedOut);
    assert_eq!(task.error.as_deref(), Some("execution timed out"));

    let stats = engine.system_stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.timed_out, 1);
}

#[tokio::test]
async fn spawn_failure_is_distinguishable_from_timeout() {
    let mut config = test_config();
    config.interpreter = "/nonexistent/codeexec-interp".to_string();
    let (engine, mut results) = engine_with(config);

    let id = engine.submit("u1", "alice", "echo unreachable").unwrap();
    let task = await_task(&mut results, id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.output.as_ref().unwrap().exit, RunExit::SpawnFailed);
    assert!(task.error.as_deref().unwrap().contains("failed to start"));
}

#[tokio::test]
async fn history_capacity_evicts_the_oldest() {
    let mut config = test_config();
    config.history_capacity = 3;
    let (engine, mut results) = engine_with(config);

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(engine.submit("u1", "alice", format!("!echo {i}")).unwrap());
    }
    for id in &ids {
        await_task(&mut results, *id).await;
    }

    let recent = engine.recent_all_for("u1", 10).unwrap();
    assert_eq!(recent.len(), 3);
    // single worker: completion order is submission order, most recent last
    let recent_ids: Vec<Uuid> = recent.iter().map(|t| t.id).collect();
    assert_eq!(recent_ids, ids[2..].to_vec());

    // evicted tasks are no longer retrievable
    assert!(engine.get_status(&ids[0]).is_none());
    assert!(engine.get_status(&ids[1]).is_none());
    assert!(engine.get_status(&ids[4]).is_some());
}

#[tokio::test]
async fn outputs_are_never_cross_assigned() {
    let mut config = test_config();
    config.worker_count = 2;
    let (engine, mut results) = engine_with(config);

    let a = engine.submit("u1", "alice", "!echo AAA").unwrap();
    let b = engine.submit("u2", "bob", "!echo BBB").unwrap();
    await_task(&mut results, a).await;
    await_task(&mut results, b).await;

    let task_a = engine.get_status(&a).unwrap();
    let task_b = engine.get_status(&b).unwrap();
    assert_eq!(task_a.output.unwrap().stdout, "AAA\n");
    assert_eq!(task_b.output.unwrap().stdout, "BBB\n");
}

#[tokio::test]
async fn stats_total_tracks_terminal_tasks() {
    let (engine, mut results) = engine_with(test_config());

    let mut ids = Vec::new();
    ids.push(engine.submit("u1", "alice", "!echo ok").unwrap());
    ids.push(engine.submit("u1", "alice", "!exit 1").unwrap());
    ids.push(engine.submit("u2", "bob", "!echo ok").unwrap());
    for id in &ids {
        await_task(&mut results, *id).await;
    }

    let stats = engine.system_stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.queue_depth, 0);

    let u1 = engine.submitter_stats("u1");
    assert_eq!(u1.submitted, 2);
    assert_eq!(u1.succeeded, 1);
    assert_eq!(u1.failed, 1);
}

#[tokio::test]
async fn recent_for_submitter_is_ordered_and_filtered() {
    let (engine, mut results) = engine_with(test_config());

    let a = engine.submit("u1", "alice", "!echo first").unwrap();
    let other = engine.submit("u2", "bob", "!echo other").unwrap();
    let b = engine.submit("u1", "alice", "!echo second").unwrap();
    for id in [a, other, b] {
        await_task(&mut results, id).await;
    }

    let for_u1 = engine.recent_for_submitter("u1", 10);
    assert_eq!(for_u1.len(), 2);
    assert_eq!(for_u1[0].id, a);
    assert_eq!(for_u1[1].id, b);
    assert_eq!(for_u1[1].output.as_ref().unwrap().stdout, "second\n");
}
