// ABOUTME: Coordinator module - schedules delegated tasks and reconciles their results.
// ABOUTME: Contains the retry policy, execution controller, worker pool, aggregator, metrics, and TaskTool.

mod aggregate;
mod controller;
mod metrics;
mod pool;
mod retry;
mod tool;

pub use aggregate::Aggregator;
pub use controller::{ExecutionContext, ExecutionController, TaskOutcome};
pub use metrics::{
    BatchMetrics, MemoryMetricsSink, MetricsRecorder, MetricsSink, TaskMetrics,
    TracingMetricsSink,
};
pub use pool::WorkerPool;
pub use retry::{RetryError, RetryPolicy};
pub use tool::TaskTool;

#[cfg(test)]
mod metrics_test;
#[cfg(test)]
mod pool_test;
#[cfg(test)]
mod retry_test;
#[cfg(test)]
mod test_support;
