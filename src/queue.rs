use std::sync::Arc;

use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver, Sender, error::TrySendError},
};
use uuid::Uuid;

use crate::{
    error::EngineError,
    task::ExecMode,
};

/// The payload a worker needs to run one submission. The full record lives
/// in the store; the queue only carries what the runner consumes.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: Uuid,
    pub submitter_id: String,
    pub source: String,
    pub mode: ExecMode,
}

/// Bounded FIFO with single-consumer claim semantics: the receiver sits
/// behind one mutex, so a task handed to a worker is gone from the queue in
/// the same step.
#[derive(Clone)]
pub struct TaskQueue {
    sender: Sender<QueuedTask>,
    receiver: Arc<Mutex<Receiver<QueuedTask>>>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Never blocks: a full queue is reported to the submitter instead of
    /// stalling the submission path.
    pub fn push(&self, task: QueuedTask) -> Result<(), EngineError> {
        self.sender.try_send(task).map_err(|err| match err {
            TrySendError::Full(_) => EngineError::QueueFull,
            TrySendError::Closed(_) => EngineError::QueueFull,
        })
    }

    pub fn receiver(&self) -> Arc<Mutex<Receiver<QueuedTask>>> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(id: Uuid) -> QueuedTask {
        QueuedTask {
            id,
            submitter_id: "u1".into(),
            source: "!true".into(),
            mode: ExecMode::Shell,
        }
    }

    #[tokio::test]
    async fn push_is_fifo() {
        let queue = TaskQueue::new(4);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        queue.push(queued(first)).unwrap();
        queue.push(queued(second)).unwrap();

        let receiver = queue.receiver();
        let mut locked = receiver.lock().await;
        assert_eq!(locked.recv().await.unwrap().id, first);
        assert_eq!(locked.recv().await.unwrap().id, second);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let queue = TaskQueue::new(1);
        queue.push(queued(Uuid::new_v4())).unwrap();
        let err = queue.push(queued(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, EngineError::QueueFull));
    }
}
