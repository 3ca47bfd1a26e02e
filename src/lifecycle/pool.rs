//! Bounded worker pool.
//!
//! A channel of capacity `queue_depth` feeds `workers` tokio tasks. Workers
//! share the receiving end, so at most `workers` assignments execute at once
//! and at most `queue_depth` more wait. Submission never blocks: a full queue
//! hands the assignment back to the caller.

use super::runner::TaskRunner;
use crate::protocol::Assignment;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Sending side of the pool's queue.
#[derive(Debug, Clone)]
pub(crate) struct WorkQueue {
    sender: Sender<Assignment>,
}

impl WorkQueue {
    /// Enqueue without waiting. Returns the assignment when there is no room.
    pub(crate) fn try_submit(&self, assignment: Assignment) -> Result<(), Assignment> {
        match self.sender.try_send(assignment) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(assignment)) | Err(TrySendError::Closed(assignment)) => {
                Err(assignment)
            }
        }
    }
}

pub(crate) struct WorkerPool {
    queue: Option<WorkQueue>,
    receiver: Arc<Mutex<Receiver<Assignment>>>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `workers` workers. They stop when the queue is closed and empty,
    /// or as soon as `cancel` fires.
    pub(crate) fn spawn(
        workers: usize,
        queue_depth: usize,
        runner: Arc<TaskRunner>,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let mut set = JoinSet::new();
        for worker in 0..workers.max(1) {
            set.spawn(work(
                worker,
                Arc::clone(&receiver),
                Arc::clone(&runner),
                cancel.clone(),
            ));
        }

        Self {
            queue: Some(WorkQueue { sender }),
            receiver,
            workers: set,
        }
    }

    /// A handle for enqueueing, or `None` once the pool is closed.
    pub(crate) fn queue(&self) -> Option<WorkQueue> {
        self.queue.clone()
    }

    /// Drop the pool's own sender. The queue closes once every `WorkQueue`
    /// handle is gone.
    pub(crate) fn close(&mut self) {
        self.queue = None;
    }

    /// Wait for every worker to exit, up to `grace`. Returns `false` when
    /// workers were still running at the deadline.
    pub(crate) async fn join(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.join_all()).await.is_ok()
    }

    pub(crate) async fn join_all(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker terminated abnormally");
            }
        }
    }

    /// Take whatever is still queued. Call after the workers are gone.
    pub(crate) async fn drain(&self) -> Vec<Assignment> {
        let mut receiver = self.receiver.lock().await;
        let mut left = Vec::new();
        while let Ok(assignment) = receiver.try_recv() {
            left.push(assignment);
        }
        left
    }
}

async fn work(
    worker: usize,
    receiver: Arc<Mutex<Receiver<Assignment>>>,
    runner: Arc<TaskRunner>,
    cancel: CancellationToken,
) {
    debug!(worker, "worker started");
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = receiver.recv() => next,
            }
        };
        let Some(assignment) = next else { break };
        runner.run(assignment, &cancel).await;
    }
    debug!(worker, "worker stopped");
}
