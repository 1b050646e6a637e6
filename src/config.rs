use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub history_capacity: usize,
    pub exec_timeout: Duration,
    pub kill_grace: Duration,
    pub max_output_bytes: usize,
    pub interpreter: String,
    pub shell: String,
    pub log_level: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            // A single worker serializes submissions: strict FIFO, a slow
            // task delays all later ones. Raising this relaxes completion
            // order but never lets two workers claim one task.
            worker_count: env_parse("WORKER_COUNT", 1usize).max(1),
            queue_capacity: env_parse("QUEUE_CAPACITY", 1024usize),
            history_capacity: env_parse("HISTORY_CAPACITY", 100usize).max(1),
            exec_timeout: Duration::from_millis(env_parse("EXEC_TIMEOUT_MS", 60_000u64)),
            kill_grace: Duration::from_millis(env_parse("KILL_GRACE_MS", 5_000u64)),
            max_output_bytes: env_parse("MAX_OUTPUT_BYTES", 40_000usize),
            interpreter: env::var("INTERPRETER").unwrap_or_else(|_| "python3".to_string()),
            shell: env::var("SHELL_BIN").unwrap_or_else(|_| "/bin/sh".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            queue_capacity: 1024,
            history_capacity: 100,
            exec_timeout: Duration::from_secs(60),
            kill_grace: Duration::from_secs(5),
            max_output_bytes: 40_000,
            interpreter: "python3".to_string(),
            shell: "/bin/sh".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
