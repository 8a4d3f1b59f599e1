// ABOUTME: Tests for task and batch metrics, the shared recorder, and metrics sinks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::{BatchMetrics, MemoryMetricsSink, MetricsRecorder, MetricsSink, TaskMetrics};
use crate::error::ErrorKind;
use crate::task::AggregateMode;

fn ran(index: usize, millis: u64, success: bool, cost: f64, tokens: u64) -> TaskMetrics {
    let mut m = TaskMetrics::begin(index, "general");
    m.total_duration = Duration::from_millis(millis);
    m.success = success;
    m.cost_incurred = cost;
    m.tokens_used = tokens;
    m
}

#[test]
fn test_batch_aggregates() {
    let tasks = vec![
        ran(2, 300, true, 0.5, 30),
        ran(0, 100, true, 0.25, 10),
        ran(1, 200, false, 0.0, 0),
        TaskMetrics::never_started(3, "general", ErrorKind::Cancelled),
    ];
    let batch = BatchMetrics::from_tasks(
        tasks,
        2,
        AggregateMode::Summary,
        Utc::now(),
        Duration::from_millis(450),
    );

    assert_eq!(batch.total_tasks, 4);
    assert_eq!(batch.successful_tasks, 2);
    assert_eq!(batch.failed_tasks, 2);
    assert_eq!(batch.successful_tasks + batch.failed_tasks, batch.total_tasks);
    assert!((batch.total_cost - 0.75).abs() < 1e-9);
    assert_eq!(batch.total_tokens, 40);

    // Never-started items do not drag the minimum to zero.
    assert_eq!(batch.min_task_time, Duration::from_millis(100));
    assert_eq!(batch.max_task_time, Duration::from_millis(300));
    assert_eq!(batch.average_task_time, Duration::from_millis(200));

    let order: Vec<usize> = batch.tasks.iter().map(|t| t.task_index).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_batch_of_never_started_tasks() {
    let tasks = vec![TaskMetrics::never_started(0, "general", ErrorKind::Cancelled)];
    let batch =
        BatchMetrics::from_tasks(tasks, 1, AggregateMode::Concat, Utc::now(), Duration::ZERO);
    assert_eq!(batch.average_task_time, Duration::ZERO);
    assert_eq!(batch.failed_tasks, 1);
}

#[test]
fn test_batch_average_over_ran_tasks() {
    let tasks = vec![
        ran(0, 100, true, 0.0, 0),
        ran(1, 250, true, 0.0, 0),
        ran(2, 700, false, 0.0, 0),
    ];
    let batch =
        BatchMetrics::from_tasks(tasks, 3, AggregateMode::Concat, Utc::now(), Duration::ZERO);
    assert_eq!(batch.average_task_time, Duration::from_millis(350));
}

#[test]
fn test_batch_metrics_serialize() {
    let batch = BatchMetrics::from_tasks(
        vec![ran(0, 1500, true, 0.1, 5)],
        1,
        AggregateMode::JsonArray,
        Utc::now(),
        Duration::from_millis(1600),
    );
    let json = serde_json::to_value(&batch).unwrap();
    assert_eq!(json["aggregate_mode"], "json_array");
    assert_eq!(json["total_duration_ms"], 1600);
    assert_eq!(json["tasks"][0]["total_duration_ms"], 1500);
    assert!(json["tasks"][0].get("error_kind").is_none());
}

#[test]
fn test_recorder_concurrent_appends() {
    let recorder = Arc::new(MetricsRecorder::new());
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let recorder = Arc::clone(&recorder);
            std::thread::spawn(move || recorder.record(ran(i, 10, true, 0.0, 0)))
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.len(), 8);
    assert!(snapshot.windows(2).all(|w| w[0].task_index < w[1].task_index));

    let batch = recorder.finish(4, AggregateMode::Concat, Utc::now(), Duration::ZERO);
    assert_eq!(batch.total_tasks, 8);
    assert!(recorder.is_empty());
}

#[test]
fn test_memory_sink_keeps_records() {
    let sink = MemoryMetricsSink::new();
    let task = ran(0, 10, true, 0.0, 0);
    sink.record_task(&task);
    sink.record_batch(&BatchMetrics::from_tasks(
        vec![task.clone()],
        1,
        AggregateMode::Concat,
        Utc::now(),
        Duration::ZERO,
    ));

    assert_eq!(sink.tasks(), vec![task]);
    assert_eq!(sink.batches().len(), 1);
}
