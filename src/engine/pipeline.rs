use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::stores::{AuditLog, VectorStore};
use crate::types::{CleanupFailure, DeletionLogEntry, DocumentId, StoreKind};

/// Cooperative cancellation signal for long-running maintenance work
#[derive(Debug, Clone)]
pub(crate) struct CancellationToken {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// What a delete batch actually did
#[derive(Debug, Default)]
pub(crate) struct PipelineOutcome {
    /// Keys removed from the store, in processing order
    pub deleted: Vec<DocumentId>,
    /// Per-key failures, including audit appends that failed after a delete
    pub failures: Vec<CleanupFailure>,
    /// Keys that were already gone when their delete ran
    pub already_absent: usize,
}

#[derive(Debug, Default)]
struct Accumulator {
    deleted: Vec<DocumentId>,
    failures: Vec<CleanupFailure>,
    already_absent: usize,
}

/// Fixed-size worker pool that drains a shared candidate queue.
///
/// Parallelism is bounded so a large orphan batch cannot hammer the store
/// with one in-flight delete per key. Every successful delete writes its
/// audit entry immediately, so a cancelled run leaves a log that matches
/// exactly what was removed.
pub(crate) struct DeletePipeline {
    worker_count: usize,
    op_timeout: Duration,
}

impl DeletePipeline {
    pub fn new(worker_count: usize, op_timeout: Duration) -> Self {
        Self {
            worker_count: worker_count.max(1),
            op_timeout,
        }
    }

    /// Delete the candidate vector records, logging each removal
    pub async fn delete_vectors(
        &self,
        store: Arc<dyn VectorStore>,
        audit: Arc<dyn AuditLog>,
        candidates: Vec<DocumentId>,
        cancel: CancellationToken,
    ) -> PipelineOutcome {
        if candidates.is_empty() {
            return PipelineOutcome::default();
        }

        let workers = self.worker_count.min(candidates.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(candidates)));
        let accumulator = Arc::new(Mutex::new(Accumulator::default()));
        let op_timeout = self.op_timeout;

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let store = store.clone();
            let audit = audit.clone();
            let queue = queue.clone();
            let accumulator = accumulator.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        log::debug!("🛑 Delete worker {} stopping on cancellation", worker_id);
                        break;
                    }

                    let next = { queue.lock().unwrap().pop_front() };
                    let Some(id) = next else {
                        break;
                    };

                    match timeout(op_timeout, store.delete(&id)).await {
                        Ok(Ok(true)) => {
                            let entry = DeletionLogEntry::cleanup(id.clone(), StoreKind::Vector);
                            match audit.append(entry).await {
                                Ok(()) => {
                                    accumulator.lock().unwrap().deleted.push(id);
                                }
                                Err(e) => {
                                    // The record is gone either way; the missing
                                    // log line must stay visible to the caller
                                    let mut acc = accumulator.lock().unwrap();
                                    acc.deleted.push(id.clone());
                                    acc.failures.push(CleanupFailure::new(
                                        id,
                                        format!("deleted, but audit append failed: {}", e),
                                    ));
                                }
                            }
                        }
                        Ok(Ok(false)) => {
                            // A concurrent run or earlier partial pass got here first
                            accumulator.lock().unwrap().already_absent += 1;
                        }
                        Ok(Err(e)) => {
                            accumulator
                                .lock()
                                .unwrap()
                                .failures
                                .push(CleanupFailure::new(id, e.to_string()));
                        }
                        Err(_) => {
                            accumulator.lock().unwrap().failures.push(CleanupFailure::new(
                                id,
                                format!("delete timed out after {}s", op_timeout.as_secs()),
                            ));
                        }
                    }
                }
            }));
        }

        join_all(handles).await;

        let mut acc = accumulator.lock().unwrap();
        PipelineOutcome {
            deleted: std::mem::take(&mut acc.deleted),
            failures: std::mem::take(&mut acc.failures),
            already_absent: acc.already_absent,
        }
    }
}
