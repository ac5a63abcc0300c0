//! The in-process work queue and `processing` set shared between the dispatch loop
//! and the `W` worker tasks (§4.D, §5).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dispatch_core::model::{JobKey, Status};
use tokio::sync::{mpsc, Mutex};

/// A dispatched job waiting for a free worker slot.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub backend_id: String,
    pub input_job_id: JobKey,
    pub command: String,
}

/// Bounded FIFO queue plus the `processing` membership set. Cloning shares the same
/// underlying channel and set, matching the "single owner per agent, shared across
/// worker tasks" shape required by the concurrency model.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::Sender<DispatchItem>,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchItem>>>,
    queued: Arc<AtomicUsize>,
    processing: Arc<Mutex<HashSet<JobKey>>>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            queued: Arc::new(AtomicUsize::new(0)),
            processing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of items currently queued (not counting items a worker has already
    /// dequeued and is actively processing).
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub async fn enqueue(&self, item: DispatchItem) {
        // Capacity is sized so this never blocks in practice: the dispatch loop only
        // admits while `len() < W`.
        let _ = self.sender.send(item).await;
        self.queued.fetch_add(1, Ordering::SeqCst);
    }

    /// Waits for the next item, decrementing the queued count as it leaves the queue.
    pub async fn dequeue(&self) -> DispatchItem {
        let item = self.receiver.lock().await.recv().await.expect("sender kept alive by queue owner");
        self.queued.fetch_sub(1, Ordering::SeqCst);
        item
    }

    pub async fn mark_processing(&self, job_key: JobKey) {
        self.processing.lock().await.insert(job_key);
    }

    pub async fn unmark_processing(&self, job_key: &JobKey) {
        self.processing.lock().await.remove(job_key);
    }

    /// `check_job_status` (§4.D): `RUNNING` iff the key is currently in `processing`.
    pub async fn check_job_status(&self, job_key: &JobKey) -> Option<Status> {
        if self.processing.lock().await.contains(job_key) {
            Some(Status::Running)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_and_dequeue_round_trips_an_item() {
        let queue = WorkQueue::new(4);
        queue
            .enqueue(DispatchItem {
                backend_id: "abc".to_string(),
                input_job_id: "A1".to_string(),
                command: "echo hi".to_string(),
            })
            .await;
        assert_eq!(queue.len(), 1);
        let item = queue.dequeue().await;
        assert_eq!(item.input_job_id, "A1");
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn processing_set_reflects_membership() {
        let queue = WorkQueue::new(4);
        assert_eq!(queue.check_job_status(&"A1".to_string()).await, None);
        queue.mark_processing("A1".to_string()).await;
        assert_eq!(queue.check_job_status(&"A1".to_string()).await, Some(Status::Running));
        queue.unmark_processing(&"A1".to_string()).await;
        assert_eq!(queue.check_job_status(&"A1".to_string()).await, None);
    }
}
