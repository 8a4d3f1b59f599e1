// ABOUTME: Per-task and per-batch execution metrics, an append-only recorder,
// ABOUTME: and sinks that emit finished records (tracing, or in-memory for inspection).

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::error::ErrorKind;
use crate::task::AggregateMode;

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Timing, cost, and outcome of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetrics {
    pub task_id: String,

    /// Position in the original request.
    pub task_index: usize,

    pub subagent_type: String,

    /// Child session the task ran in, once created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[serde(rename = "total_duration_ms", serialize_with = "as_millis")]
    pub total_duration: Duration,

    #[serde(rename = "session_creation_duration_ms", serialize_with = "as_millis")]
    pub session_creation_duration: Duration,

    #[serde(rename = "execution_duration_ms", serialize_with = "as_millis")]
    pub execution_duration: Duration,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Session-creation attempts beyond the first.
    pub retry_attempts: u32,

    pub cost_incurred: f64,
    pub tokens_used: u64,

    /// Length in bytes of the result text.
    pub result_length: usize,

    /// False for items that were backfilled without ever running.
    pub started: bool,
}

impl TaskMetrics {
    /// Metrics for a task beginning now.
    pub fn begin(task_index: usize, subagent_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task_index,
            subagent_type: subagent_type.into(),
            session_id: None,
            start_time: now,
            end_time: now,
            total_duration: Duration::ZERO,
            session_creation_duration: Duration::ZERO,
            execution_duration: Duration::ZERO,
            success: false,
            error_kind: None,
            retry_attempts: 0,
            cost_incurred: 0.0,
            tokens_used: 0,
            result_length: 0,
            started: true,
        }
    }

    /// Metrics for a task that never started.
    pub fn never_started(
        task_index: usize,
        subagent_type: impl Into<String>,
        kind: ErrorKind,
    ) -> Self {
        Self {
            error_kind: Some(kind),
            started: false,
            ..Self::begin(task_index, subagent_type)
        }
    }
}

/// Aggregate view of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub batch_id: String,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub max_workers: usize,
    pub aggregate_mode: AggregateMode,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[serde(rename = "total_duration_ms", serialize_with = "as_millis")]
    pub total_duration: Duration,

    /// Timing aggregates cover tasks that actually ran.
    #[serde(rename = "average_task_time_ms", serialize_with = "as_millis")]
    pub average_task_time: Duration,
    #[serde(rename = "max_task_time_ms", serialize_with = "as_millis")]
    pub max_task_time: Duration,
    #[serde(rename = "min_task_time_ms", serialize_with = "as_millis")]
    pub min_task_time: Duration,

    pub total_cost: f64,
    pub total_tokens: u64,

    /// Per-task metrics in task index order.
    pub tasks: Vec<TaskMetrics>,
}

impl BatchMetrics {
    pub fn from_tasks(
        mut tasks: Vec<TaskMetrics>,
        max_workers: usize,
        aggregate_mode: AggregateMode,
        start_time: DateTime<Utc>,
        total_duration: Duration,
    ) -> Self {
        tasks.sort_by_key(|t| t.task_index);

        let successful_tasks = tasks.iter().filter(|t| t.success).count();
        let ran: Vec<Duration> = tasks
            .iter()
            .filter(|t| t.started)
            .map(|t| t.total_duration)
            .collect();

        let (min_task_time, max_task_time, average_task_time) = if ran.is_empty() {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let sum: Duration = ran.iter().sum();
            (
                ran.iter().copied().min().unwrap_or_default(),
                ran.iter().copied().max().unwrap_or_default(),
                match u32::try_from(ran.len()) {
                    Ok(n) => sum / n,
                    Err(_) => sum.div_f64(ran.len() as f64),
                },
            )
        };

        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            total_tasks: tasks.len(),
            successful_tasks,
            failed_tasks: tasks.len() - successful_tasks,
            max_workers,
            aggregate_mode,
            start_time,
            end_time: Utc::now(),
            total_duration,
            average_task_time,
            max_task_time,
            min_task_time,
            total_cost: tasks.iter().map(|t| t.cost_incurred).sum(),
            total_tokens: tasks.iter().map(|t| t.tokens_used).sum(),
            tasks,
        }
    }
}

/// Append-only collection of task metrics, shared across workers.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    tasks: Mutex<Vec<TaskMetrics>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, metrics: TaskMetrics) {
        self.tasks.lock().push(metrics);
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Recorded metrics in task index order.
    pub fn snapshot(&self) -> Vec<TaskMetrics> {
        let mut tasks = self.tasks.lock().clone();
        tasks.sort_by_key(|t| t.task_index);
        tasks
    }

    /// Compute batch aggregates once every worker has joined.
    pub fn finish(
        &self,
        max_workers: usize,
        aggregate_mode: AggregateMode,
        start_time: DateTime<Utc>,
        total_duration: Duration,
    ) -> BatchMetrics {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        BatchMetrics::from_tasks(tasks, max_workers, aggregate_mode, start_time, total_duration)
    }
}

/// Destination for finished metrics records.
pub trait MetricsSink: Send + Sync {
    fn record_task(&self, metrics: &TaskMetrics);
    fn record_batch(&self, metrics: &BatchMetrics);
}

/// Logs a summary line at info and the full record as JSON at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_task(&self, m: &TaskMetrics) {
        info!(
            task_id = %m.task_id,
            task_index = m.task_index,
            subagent_type = %m.subagent_type,
            success = m.success,
            error_kind = m.error_kind.map(|k| k.as_str()).unwrap_or(""),
            duration_ms = m.total_duration.as_millis() as u64,
            retry_attempts = m.retry_attempts,
            cost = m.cost_incurred,
            tokens = m.tokens_used,
            "Task metrics"
        );
        if let Ok(json) = serde_json::to_string(m) {
            debug!(record = %json, "Task metrics record");
        }
    }

    fn record_batch(&self, m: &BatchMetrics) {
        info!(
            batch_id = %m.batch_id,
            total = m.total_tasks,
            successful = m.successful_tasks,
            failed = m.failed_tasks,
            max_workers = m.max_workers,
            aggregate_mode = %m.aggregate_mode,
            duration_ms = m.total_duration.as_millis() as u64,
            cost = m.total_cost,
            tokens = m.total_tokens,
            "Batch metrics"
        );
        if let Ok(json) = serde_json::to_string(m) {
            debug!(record = %json, "Batch metrics record");
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    tasks: Mutex<Vec<TaskMetrics>>,
    batches: Mutex<Vec<BatchMetrics>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<TaskMetrics> {
        self.tasks.lock().clone()
    }

    pub fn batches(&self) -> Vec<BatchMetrics> {
        self.batches.lock().clone()
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn record_task(&self, metrics: &TaskMetrics) {
        self.tasks.lock().push(metrics.clone());
    }

    fn record_batch(&self, metrics: &BatchMetrics) {
        self.batches.lock().push(metrics.clone());
    }
}
