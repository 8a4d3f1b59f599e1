// ABOUTME: WorkerPool - runs a batch with bounded concurrency and index-ordered results.
// ABOUTME: A batch deadline stops new work, cancels running items, and backfills unfinished slots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use super::controller::{ExecutionContext, ExecutionController, TaskOutcome};
use super::metrics::MetricsRecorder;
use crate::error::ErrorKind;
use crate::task::{TaskRequest, format_duration};

/// Bounded-concurrency executor for task batches.
#[derive(Clone)]
pub struct WorkerPool {
    controller: Arc<ExecutionController>,
}

impl WorkerPool {
    pub fn new(controller: Arc<ExecutionController>) -> Self {
        Self { controller }
    }

    /// Run every task, at most `max_workers` at a time.
    ///
    /// `batch.timeout` bounds the whole batch and `batch.cancel` is the
    /// ambient cancellation; each item runs under `item_timeout`. The
    /// returned vector always has one outcome per task, in task order.
    pub async fn run(
        &self,
        tasks: &[TaskRequest],
        max_workers: usize,
        item_timeout: Duration,
        batch: &ExecutionContext,
        recorder: &Arc<MetricsRecorder>,
    ) -> Vec<TaskOutcome> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = max_workers.clamp(1, total);
        info!(
            tasks = total,
            workers,
            timeout = %format_duration(batch.timeout),
            "Starting batch"
        );

        let batch_token = batch.cancel.child_token();
        let deadline_hit = Arc::new(AtomicBool::new(false));

        // Pre-load every item, then close the queue.
        let (work_tx, work_rx) = mpsc::channel::<(usize, TaskRequest)>(total);
        for (index, task) in tasks.iter().cloned().enumerate() {
            if work_tx.try_send((index, task)).is_err() {
                error!(task_index = index, "Work queue rejected item");
            }
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let watchdog = {
            let token = batch_token.clone();
            let deadline_hit = Arc::clone(&deadline_hit);
            let deadline = batch.timeout;
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(deadline) => {
                        warn!(timeout = %format_duration(deadline), "Batch deadline exceeded, cancelling");
                        deadline_hit.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                    () = token.cancelled() => {}
                }
            })
        };

        let (result_tx, mut result_rx) = mpsc::channel::<TaskOutcome>(total);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let controller = Arc::clone(&self.controller);
            let recorder = Arc::clone(recorder);
            let item_ctx = ExecutionContext {
                parent_session_id: batch.parent_session_id.clone(),
                call_stack: batch.call_stack.clone(),
                cancel: batch_token.clone(),
                timeout: item_timeout,
            };

            handles.push(tokio::spawn(async move {
                loop {
                    if item_ctx.cancel.is_cancelled() {
                        break;
                    }
                    let next = work_rx.lock().await.recv().await;
                    let Some((index, task)) = next else {
                        break;
                    };
                    if item_ctx.cancel.is_cancelled() {
                        break;
                    }

                    debug!(worker_id, task_index = index, "Worker picked up task");
                    let outcome = controller
                        .execute(index, &task, &item_ctx.child(item_ctx.timeout))
                        .await;
                    recorder.record(outcome.metrics.clone());
                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Worker exiting");
            }));
        }
        drop(result_tx);

        let collector = tokio::spawn(async move {
            let mut slots: Vec<Option<TaskOutcome>> = (0..total).map(|_| None).collect();
            while let Some(outcome) = result_rx.recv().await {
                match slots.get_mut(outcome.task_index) {
                    Some(slot) => *slot = Some(outcome),
                    None => error!(task_index = outcome.task_index, "Outcome index out of range"),
                }
            }
            slots
        });

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Batch worker panicked");
            }
        }
        let slots = match collector.await {
            Ok(slots) => slots,
            Err(e) => {
                error!(error = %e, "Batch collector panicked");
                (0..total).map(|_| None).collect()
            }
        };
        watchdog.abort();

        let (kind, reason) = if deadline_hit.load(Ordering::SeqCst) {
            (ErrorKind::Cancelled, "batch deadline exceeded before task started")
        } else if batch_token.is_cancelled() {
            (ErrorKind::Cancelled, "batch cancelled before task started")
        } else {
            (ErrorKind::ExecutionFailed, "task did not report an outcome")
        };

        let outcomes: Vec<TaskOutcome> = slots
            .into_iter()
            .zip(tasks)
            .enumerate()
            .map(|(index, (slot, task))| {
                slot.unwrap_or_else(|| {
                    let outcome = TaskOutcome::not_started(index, &task.subagent_type, kind, reason);
                    recorder.record(outcome.metrics.clone());
                    outcome
                })
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            tasks = total,
            succeeded,
            failed = total - succeeded,
            "Batch finished"
        );
        outcomes
    }
}
