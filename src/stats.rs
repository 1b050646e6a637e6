use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    /// Tasks that have reached a terminal status; monotonic.
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cumulative_duration_ms: u64,
    pub queue_depth: u64,
}

/// System-wide and per-submitter counters. Submitted bumps on enqueue;
/// everything else bumps exactly once, in the worker, on the terminal
/// transition.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    submitted_total: AtomicU64,
    terminal_total: AtomicU64,
    succeeded_total: AtomicU64,
    failed_total: AtomicU64,
    timed_out_total: AtomicU64,
    cumulative_duration_ms: AtomicU64,
    queue_depth: AtomicU64,
    per_submitter: DashMap<String, SubmitterStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self, submitter_id: &str) {
        self.submitted_total.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
        self.per_submitter
            .entry(submitter_id.to_string())
            .or_default()
            .submitted += 1;
    }

    /// Rolls back a submission that never made it into the queue.
    pub fn submission_rejected(&self, submitter_id: &str) {
        self.submitted_total.fetch_sub(1, Ordering::Relaxed);
        self.decrement_queue_depth();
        if let Some(mut entry) = self.per_submitter.get_mut(submitter_id) {
            entry.submitted = entry.submitted.saturating_sub(1);
        }
    }

    pub fn started(&self) {
        self.decrement_queue_depth();
    }

    pub fn succeeded(&self, submitter_id: &str, duration_ms: u64) {
        self.terminal_total.fetch_add(1, Ordering::Relaxed);
        self.succeeded_total.fetch_add(1, Ordering::Relaxed);
        self.cumulative_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        self.per_submitter
            .entry(submitter_id.to_string())
            .or_default()
            .succeeded += 1;
    }

    pub fn failed(&self, submitter_id: &str, duration_ms: u64, timed_out: bool) {
        self.terminal_total.fetch_add(1, Ordering::Relaxed);
        self.failed_total.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timed_out_total.fetch_add(1, Ordering::Relaxed);
        }
        self.cumulative_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        self.per_submitter
            .entry(submitter_id.to_string())
            .or_default()
            .failed += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted_total.load(Ordering::Relaxed),
            total: self.terminal_total.load(Ordering::Relaxed),
            succeeded: self.succeeded_total.load(Ordering::Relaxed),
            failed: self.failed_total.load(Ordering::Relaxed),
            timed_out: self.timed_out_total.load(Ordering::Relaxed),
            cumulative_duration_ms: self.cumulative_duration_ms.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }

    pub fn for_submitter(&self, submitter_id: &str) -> SubmitterStats {
        self.per_submitter
            .get(submitter_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn decrement_queue_depth(&self) {
        let mut current = self.queue_depth.load(Ordering::Relaxed);
        while current > 0 {
            match self.queue_depth.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StatsRegistry;

    #[test]
    fn queue_depth_does_not_underflow() {
        let stats = StatsRegistry::new();
        stats.started();
        assert_eq!(stats.snapshot().queue_depth, 0);
    }

    #[test]
    fn terminal_counters_accumulate() {
        let stats = StatsRegistry::new();
        stats.submitted("u1");
        stats.submitted("u1");
        stats.submitted("u2");
        stats.succeeded("u1", 100);
        stats.failed("u1", 50, true);
        stats.failed("u2", 10, false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.submitted, 3);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.timed_out, 1);
        assert_eq!(snapshot.cumulative_duration_ms, 160);

        let u1 = stats.for_submitter("u1");
        assert_eq!(u1.submitted, 2);
        assert_eq!(u1.succeeded, 1);
        assert_eq!(u1.failed, 1);
        assert_eq!(stats.for_submitter("u3"), Default::default());
    }

    #[test]
    fn rejected_submission_rolls_back() {
        let stats = StatsRegistry::new();
        stats.submitted("u1");
        stats.submission_rejected("u1");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.submitted, 0);
        assert_eq!(snapshot.queue_depth, 0);
        assert_eq!(stats.for_submitter("u1").submitted, 0);
    }
}
