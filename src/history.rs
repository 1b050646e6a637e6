use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use uuid::Uuid;

use crate::task::Task;

struct Ring {
    entries: VecDeque<Task>,
    seen: HashSet<Uuid>,
}

/// Capped ring of terminal tasks in completion order. Insertion evicts the
/// oldest entry once over capacity; eviction order is completion order, not
/// wall-clock age.
pub struct HistoryStore {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity.max(1)),
                seen: HashSet::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a terminal task, returning the evicted task id when the ring
    /// is over capacity. Recording the same live id twice is a no-op, so
    /// stats callers keyed off the return stay exactly-once.
    pub fn record(&self, task: Task) -> RecordOutcome {
        let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        if !ring.seen.insert(task.id) {
            tracing::warn!(task_id = %task.id, "duplicate history record ignored");
            return RecordOutcome::Duplicate;
        }
        ring.entries.push_back(task);
        if ring.entries.len() > self.capacity {
            if let Some(evicted) = ring.entries.pop_front() {
                ring.seen.remove(&evicted.id);
                return RecordOutcome::Recorded {
                    evicted: Some(evicted.id),
                };
            }
        }
        RecordOutcome::Recorded { evicted: None }
    }

    /// Last `n` terminal tasks, most recent last.
    pub fn recent(&self, n: usize) -> Vec<Task> {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        let skip = ring.entries.len().saturating_sub(n);
        ring.entries.iter().skip(skip).cloned().collect()
    }

    /// Last `n` terminal tasks for one submitter, most recent last.
    pub fn recent_for(&self, submitter_id: &str, n: usize) -> Vec<Task> {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<Task> = ring
            .entries
            .iter()
            .rev()
            .filter(|task| task.submitter_id == submitter_id)
            .take(n)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    pub fn len(&self) -> usize {
        self.ring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { evicted: Option<Uuid> },
    Duplicate,
}
