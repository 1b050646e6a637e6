use dashmap::DashMap;
use uuid::Uuid;

use crate::task::{Task, TaskOutput, TaskStatus};

/// Owner of the id -> Task map. Workers are the only writers after
/// insertion; everyone else gets cloned snapshots, so a reader never sees a
/// task mid-update (status and output are published under the same entry
/// lock).
#[derive(Default)]
pub struct TaskStore {
    records: DashMap<Uuid, Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.records.insert(task.id, task);
    }

    pub fn get(&self, id: &Uuid) -> Option<Task> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) {
        self.records.remove(id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mark_running(&self, id: Uuid) {
        if let Some(mut entry) = self.records.get_mut(&id) {
            entry.status = TaskStatus::Running;
            entry.started_at = Some(chrono::Utc::now());
        }
    }

    /// Terminal transition: status, output, diagnostic and finished_at land
    /// in one write so the snapshot a reader clones is never torn. Returns
    /// the terminal snapshot for history/stats/delivery.
    pub fn mark_finished(
        &self,
        id: Uuid,
        status: TaskStatus,
        output: Option<TaskOutput>,
        error: Option<String>,
    ) -> Option<Task> {
        let mut entry = self.records.get_mut(&id)?;
        if entry.status.is_terminal() {
            tracing::warn!(task_id = %id, "ignoring second terminal transition");
            return None;
        }
        entry.status = status;
        entry.output = output;
        entry.error = error;
        entry.finished_at = Some(chrono::Utc::now());
        Some(entry.clone())
    }
}
