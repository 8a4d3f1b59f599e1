// ABOUTME: Tests for the worker pool - ordering, bounded concurrency, partial failure,
// ABOUTME: deadline backfill, ambient cancellation, and parent cost totals.

use std::sync::Arc;
use std::time::Duration;

use super::test_support::{Harness, RUN_COST, task};
use super::{MetricsRecorder, TaskOutcome, WorkerPool};
use crate::error::ErrorKind;
use crate::task::TaskRequest;

const ITEM: Duration = Duration::from_secs(30);

async fn run(
    h: &Harness,
    tasks: &[TaskRequest],
    workers: usize,
    batch_timeout: Duration,
) -> (Vec<TaskOutcome>, Arc<MetricsRecorder>) {
    let recorder = Arc::new(MetricsRecorder::new());
    let pool = WorkerPool::new(Arc::clone(&h.controller));
    let outcomes = pool
        .run(tasks, workers, ITEM, &h.context(batch_timeout), &recorder)
        .await;
    (outcomes, recorder)
}

fn texts(outcomes: &[TaskOutcome]) -> Vec<Option<String>> {
    outcomes.iter().map(|o| o.result.clone()).collect()
}

#[tokio::test]
async fn test_results_follow_submission_order() {
    let h = Harness::new().await;
    // Earlier tasks finish last.
    let tasks = vec![
        task("slow:60:first"),
        task("slow:30:second"),
        task("slow:0:third"),
    ];

    let (outcomes, recorder) = run(&h, &tasks, 3, ITEM).await;

    let indices: Vec<usize> = outcomes.iter().map(|o| o.task_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        texts(&outcomes),
        vec![
            Some("first".to_string()),
            Some("second".to_string()),
            Some("third".to_string())
        ]
    );
    assert_eq!(recorder.len(), 3);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let h = Harness::new().await;
    let tasks: Vec<_> = (0..6).map(|i| task(&format!("slow:30:r{i}"))).collect();

    let (outcomes, _) = run(&h, &tasks, 2, ITEM).await;

    assert!(outcomes.iter().all(TaskOutcome::is_success));
    assert!(h.agents.peak() <= 2, "peak was {}", h.agents.peak());
    assert!(h.agents.peak() >= 1);
}

#[tokio::test]
async fn test_partial_failure_does_not_fail_batch() {
    let h = Harness::new().await;
    let tasks = vec![task("reply:a"), task("fail:broken"), task("reply:c")];

    let (outcomes, _) = run(&h, &tasks, 2, ITEM).await;

    assert!(outcomes[0].is_success());
    assert_eq!(
        outcomes[1].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::ExecutionFailed)
    );
    assert!(outcomes[2].is_success());

    // Only successful children contribute cost.
    let parent = h.parent_now().await;
    assert!((parent.cost - 2.0 * RUN_COST).abs() < 1e-9);
}

#[tokio::test]
async fn test_deadline_backfills_every_slot() {
    let h = Harness::new().await;
    let tasks: Vec<_> = (0..4).map(|_| task("hang")).collect();

    let (outcomes, recorder) = run(&h, &tasks, 1, Duration::from_millis(50)).await;

    assert_eq!(outcomes.len(), 4);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.task_index, i);
        assert_eq!(
            outcome.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Cancelled)
        );
    }
    // The first item was running; the rest never started.
    assert!(outcomes[0].metrics.started);
    assert!(outcomes[1..].iter().all(|o| !o.metrics.started));
    assert!(
        outcomes[3]
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("deadline")
    );
    assert_eq!(recorder.len(), 4);
    assert_eq!(h.parent_now().await.cost, 0.0);
}

#[tokio::test]
async fn test_ambient_cancel_mid_batch() {
    let h = Harness::new().await;
    let tasks = vec![task("reply:quick"), task("hang"), task("hang"), task("hang")];
    let ctx = h.context(ITEM);
    let token = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let recorder = Arc::new(MetricsRecorder::new());
    let outcomes = WorkerPool::new(Arc::clone(&h.controller))
        .run(&tasks, 2, ITEM, &ctx, &recorder)
        .await;

    assert_eq!(outcomes.len(), tasks.len());
    assert!(outcomes[0].is_success());
    for outcome in &outcomes[1..] {
        assert_eq!(
            outcome.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Cancelled)
        );
    }
}

#[tokio::test]
async fn test_item_timeout_applies_per_task() {
    let h = Harness::new().await;
    let tasks = vec![task("reply:a"), task("hang")];
    let recorder = Arc::new(MetricsRecorder::new());

    let outcomes = WorkerPool::new(Arc::clone(&h.controller))
        .run(
            &tasks,
            2,
            Duration::from_millis(40),
            &h.context(ITEM),
            &recorder,
        )
        .await;

    assert!(outcomes[0].is_success());
    assert_eq!(
        outcomes[1].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Timeout)
    );
}

#[tokio::test]
async fn test_reruns_are_identically_ordered() {
    let h = Harness::new().await;
    let tasks = vec![
        task("slow:20:a"),
        task("fail:b"),
        task("slow:5:c"),
        task("reply:d"),
    ];

    let (first, _) = run(&h, &tasks, 3, ITEM).await;
    let (second, _) = run(&h, &tasks, 3, ITEM).await;

    assert_eq!(texts(&first), texts(&second));
    let errors = |o: &[TaskOutcome]| -> Vec<_> { o.iter().map(|x| x.error.clone()).collect() };
    assert_eq!(errors(&first), errors(&second));
}

#[tokio::test]
async fn test_empty_batch() {
    let h = Harness::new().await;
    let (outcomes, recorder) = run(&h, &[], 3, ITEM).await;
    assert!(outcomes.is_empty());
    assert!(recorder.is_empty());
}
