use std::sync::Arc;

use anyhow::Context;
use codeexec::{
    ChannelSink, Engine, EngineConfig, ProcessRunner, format_outcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Minimal local transport: one line from stdin is one submission, results
/// are printed as they complete. Stands in for the chat layer the engine is
/// normally embedded in.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    init_tracing(&config);

    let runner = Arc::new(ProcessRunner::from_config(&config));
    let (sink, mut results) = ChannelSink::new();
    let engine = Engine::new(&config, runner, Arc::new(sink));

    tracing::info!(
        workers = config.worker_count,
        timeout_ms = config.exec_timeout.as_millis() as u64,
        "execution engine ready; reading submissions from stdin"
    );

    let max_output = config.max_output_bytes;
    let printer = tokio::spawn(async move {
        while let Some(task) = results.recv().await {
            println!("--- task {} ---", task.id);
            println!("{}", format_outcome(&task, max_output));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        if line.trim().is_empty() {
            continue;
        }
        match engine.submit("local", "local", line) {
            Ok(id) => tracing::info!(task_id = %id, "submitted"),
            Err(err) => eprintln!("rejected: {err}"),
        }
    }

    let stats = engine.system_stats();
    drop(engine);
    let _ = printer.await;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("stats serialization failed")?
    );
    Ok(())
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
