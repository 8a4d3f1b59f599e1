// ABOUTME: TaskTool - the `task` tool that delegates single tasks or batches to subagents.
// ABOUTME: Validates input, runs through the controller or pool, aggregates, and emits metrics.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::aggregate::Aggregator;
use super::controller::{ExecutionContext, ExecutionController};
use super::metrics::{MetricsRecorder, MetricsSink, TracingMetricsSink};
use super::pool::WorkerPool;
use crate::agent::TASK_TOOL_NAME;
use crate::config::DelegateConfig;
use crate::context::ToolContext;
use crate::error::{DelegateError, ErrorKind};
use crate::task::{AggregateMode, BatchRequest, TaskRequest, ValidatedRequest, validate};
use crate::tool::{Tool, ToolResult};

/// Delegates work to isolated subagents.
///
/// Accepts either one task (`description`, `prompt`, `subagent_type`) or a
/// batch under `tasks`. Single tasks return the subagent's final text;
/// batches return the aggregated report.
pub struct TaskTool {
    controller: Arc<ExecutionController>,
    pool: WorkerPool,
    aggregator: Aggregator,
    config: DelegateConfig,
    sink: Arc<dyn MetricsSink>,
    description: String,
}

impl TaskTool {
    pub fn new(controller: ExecutionController, config: DelegateConfig) -> Self {
        let controller = Arc::new(controller.with_default_retry(&config.retry));
        let description = format!(
            "Delegate work to isolated subagents. Each subagent runs in its own session \
             with a tool set scoped to its type, and its cost is added to yours.\n\n\
             Pass `description`, `prompt`, and `subagent_type` for one task, or a `tasks` \
             array to run several concurrently (bounded by `max_workers`) and combine \
             their results with `aggregate_mode`.\n\n\
             Available subagent types:\n\n{}",
            controller.registry().describe()
        );
        Self {
            pool: WorkerPool::new(Arc::clone(&controller)),
            aggregator: Aggregator::new(config.summary_excerpt_chars),
            controller,
            config,
            sink: Arc::new(TracingMetricsSink),
            description,
        }
    }

    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &DelegateConfig {
        &self.config
    }

    /// Validate and run a tool call. Errors mean nothing useful could be returned.
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        params: serde_json::Value,
    ) -> Result<ToolResult, DelegateError> {
        let request = validate(&params, self.controller.registry(), &self.config)?;
        match request {
            ValidatedRequest::Single { task, timeout } => {
                let exec = ExecutionContext {
                    parent_session_id: ctx.session_id.clone(),
                    call_stack: ctx.call_stack.clone(),
                    cancel: ctx.cancel.child_token(),
                    timeout,
                };
                Ok(self.run_single(&task, &exec).await)
            }
            ValidatedRequest::Batch(batch) => {
                let exec = ExecutionContext {
                    parent_session_id: ctx.session_id.clone(),
                    call_stack: ctx.call_stack.clone(),
                    cancel: ctx.cancel.child_token(),
                    timeout: batch.timeout,
                };
                self.run_batch(&batch, &exec).await
            }
        }
    }

    async fn run_single(&self, task: &TaskRequest, exec: &ExecutionContext) -> ToolResult {
        let outcome = self.controller.execute(0, task, exec).await;
        self.sink.record_task(&outcome.metrics);

        match (outcome.error, outcome.result) {
            (Some(err), _) => ToolResult::error(err.to_string())
                .with_metadata("error_kind", err.kind)
                .with_metadata("metrics", &outcome.metrics),
            (None, text) => ToolResult::text(text.unwrap_or_default())
                .with_metadata("metrics", &outcome.metrics),
        }
    }

    async fn run_batch(
        &self,
        batch: &BatchRequest,
        exec: &ExecutionContext,
    ) -> Result<ToolResult, DelegateError> {
        let start_time = Utc::now();
        let started = Instant::now();
        let recorder = Arc::new(MetricsRecorder::new());

        let outcomes = self
            .pool
            .run(
                &batch.tasks,
                batch.max_workers,
                self.config.batch_item_timeout,
                exec,
                &recorder,
            )
            .await;

        let metrics = recorder.finish(
            batch.max_workers,
            batch.aggregate_mode,
            start_time,
            started.elapsed(),
        );
        for task in &metrics.tasks {
            self.sink.record_task(task);
        }
        self.sink.record_batch(&metrics);

        let body = self
            .aggregator
            .aggregate(batch.aggregate_mode, &outcomes, batch.tasks.len())?;
        info!(
            tasks = batch.tasks.len(),
            aggregate_mode = %batch.aggregate_mode,
            bytes = body.len(),
            "Batch aggregated"
        );

        Ok(ToolResult::text(body).with_metadata("batch_metrics", &metrics))
    }
}

fn error_kind(err: &DelegateError) -> ErrorKind {
    match err {
        DelegateError::Validation(v) => v.kind(),
        DelegateError::Aggregation(_) => ErrorKind::AggregationError,
        _ => ErrorKind::ExecutionFailed,
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        TASK_TOOL_NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> serde_json::Value {
        let types = self.controller.registry().names();
        let modes: Vec<&str> = AggregateMode::ALL.iter().map(|m| m.as_str()).collect();
        let task_properties = serde_json::json!({
            "description": {
                "type": "string",
                "description": "A short (3-5 word) label for the task"
            },
            "prompt": {
                "type": "string",
                "description": "Complete instructions for the subagent"
            },
            "subagent_type": {
                "type": "string",
                "enum": types,
                "description": "Which kind of subagent runs the task"
            }
        });

        let mut properties = task_properties.clone();
        if let Some(map) = properties.as_object_mut() {
            map.insert(
                "tasks".into(),
                serde_json::json!({
                    "type": "array",
                    "minItems": 1,
                    "description": "Tasks to run concurrently; use instead of the single-task fields",
                    "items": {
                        "type": "object",
                        "properties": task_properties,
                        "required": ["description", "prompt", "subagent_type"]
                    }
                }),
            );
            map.insert(
                "max_workers".into(),
                serde_json::json!({
                    "type": "integer",
                    "minimum": 1,
                    "description": format!(
                        "Maximum tasks running at once (default: min(task count, {}))",
                        self.config.default_max_workers
                    )
                }),
            );
            map.insert(
                "aggregate_mode".into(),
                serde_json::json!({
                    "type": "string",
                    "enum": modes,
                    "description": "How batch results are combined (default: concat)"
                }),
            );
            map.insert(
                "timeout".into(),
                serde_json::json!({
                    "type": "string",
                    "description": "Deadline such as \"90s\" or \"1h30m\" (batch default: 30m)"
                }),
            );
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "oneOf": [
                {"required": ["description", "prompt", "subagent_type"]},
                {"required": ["tasks"]}
            ]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        params: serde_json::Value,
    ) -> Result<ToolResult, anyhow::Error> {
        match self.dispatch(ctx, params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(session_id = %ctx.session_id, error = %e, "Task request rejected");
                Ok(ToolResult::error(e.to_string()).with_metadata("error_kind", error_kind(&e)))
            }
        }
    }
}
