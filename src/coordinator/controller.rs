// ABOUTME: ExecutionController - runs one task to a terminal TaskOutcome.
// ABOUTME: Session creation with retry, scoped agent build, bounded run, classification, cost rollup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics::TaskMetrics;
use super::retry::{RetryError, RetryPolicy};
use crate::agent::{Agent, AgentOutput, AgentService, CapabilityRegistry, RunRequest, Toolset};
use crate::config::RetryConfig;
use crate::context::CallStack;
use crate::error::{AgentError, ErrorKind, SessionError, TaskError};
use crate::session::{Session, SessionService};
use crate::task::{TaskRequest, format_duration};

/// Terminal result of one task, always paired with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_index: usize,

    /// Final agent text; present iff the task succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Present iff the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,

    pub metrics: TaskMetrics,
}

impl TaskOutcome {
    pub fn success(text: String, metrics: TaskMetrics) -> Self {
        Self {
            task_index: metrics.task_index,
            result: Some(text),
            error: None,
            metrics,
        }
    }

    pub fn failure(error: TaskError, metrics: TaskMetrics) -> Self {
        Self {
            task_index: metrics.task_index,
            result: None,
            error: Some(error),
            metrics,
        }
    }

    /// Outcome for an item that never got to run.
    pub fn not_started(
        task_index: usize,
        subagent_type: &str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::failure(
            TaskError::new(kind, message),
            TaskMetrics::never_started(task_index, subagent_type, kind),
        )
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Where and how long a task may run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Session that receives the cost rollup.
    pub parent_session_id: String,

    pub call_stack: CallStack,

    /// Ambient cancellation, e.g. an enclosing batch deadline.
    pub cancel: CancellationToken,

    /// The task's own execution deadline.
    pub timeout: Duration,
}

impl ExecutionContext {
    pub fn new(parent_session_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            parent_session_id: parent_session_id.into(),
            call_stack: CallStack::new(),
            cancel: CancellationToken::new(),
            timeout,
        }
    }

    pub fn with_call_stack(mut self, call_stack: CallStack) -> Self {
        self.call_stack = call_stack;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Same parent and call stack under a new deadline and a child token.
    pub fn child(&self, timeout: Duration) -> Self {
        Self {
            parent_session_id: self.parent_session_id.clone(),
            call_stack: self.call_stack.clone(),
            cancel: self.cancel.child_token(),
            timeout,
        }
    }
}

enum RunEnd {
    Finished(Result<AgentOutput, AgentError>),
    TimedOut,
    Cancelled,
}

/// Runs individual tasks against isolated child sessions.
pub struct ExecutionController {
    registry: CapabilityRegistry,
    sessions: Arc<dyn SessionService>,
    agents: Arc<dyn AgentService>,
    toolset: Arc<dyn Toolset>,

    /// Unset until configured; `RetryPolicy::default()` applies then.
    retry: Option<RetryPolicy>,

    /// Serializes read-modify-write of parent session totals.
    rollup_lock: Mutex<()>,
}

impl ExecutionController {
    pub fn new(
        registry: CapabilityRegistry,
        sessions: Arc<dyn SessionService>,
        agents: Arc<dyn AgentService>,
        toolset: Arc<dyn Toolset>,
    ) -> Self {
        Self {
            registry,
            sessions,
            agents,
            toolset,
            retry: None,
            rollup_lock: Mutex::new(()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Use `config` for session-creation retries unless a policy was set explicitly.
    pub fn with_default_retry(mut self, config: &RetryConfig) -> Self {
        self.retry.get_or_insert_with(|| RetryPolicy::from_config(config));
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<dyn SessionService> {
        &self.sessions
    }

    /// Run `task` to completion. Never fails; failures are classified into the outcome.
    pub async fn execute(
        &self,
        task_index: usize,
        task: &TaskRequest,
        ctx: &ExecutionContext,
    ) -> TaskOutcome {
        info!(
            task_index,
            subagent_type = %task.subagent_type,
            description = %task.description,
            timeout = %format_duration(ctx.timeout),
            "Starting task"
        );

        let mut metrics = TaskMetrics::begin(task_index, &task.subagent_type);
        let started = Instant::now();
        let result = self.run_task(task, ctx, &mut metrics).await;
        metrics.total_duration = started.elapsed();
        metrics.end_time = Utc::now();

        match result {
            Ok(text) => {
                metrics.success = true;
                metrics.result_length = text.len();
                info!(
                    task_index,
                    duration_ms = metrics.total_duration.as_millis() as u64,
                    "Task completed"
                );
                TaskOutcome::success(text, metrics)
            }
            Err(error) => {
                metrics.error_kind = Some(error.kind);
                info!(task_index, error = %error, "Task failed");
                TaskOutcome::failure(error, metrics)
            }
        }
    }

    async fn run_task(
        &self,
        task: &TaskRequest,
        ctx: &ExecutionContext,
        metrics: &mut TaskMetrics,
    ) -> Result<String, TaskError> {
        let session = self.create_session(task, ctx, metrics).await?;
        metrics.session_id = Some(session.id.clone());

        let agent = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                return Err(TaskError::new(
                    ErrorKind::Cancelled,
                    "cancelled during agent creation",
                ));
            }
            agent = self.build_agent(task) => agent?,
        };

        let run_token = ctx.cancel.child_token();
        let request = RunRequest {
            session_id: session.id.clone(),
            prompt: task.prompt.clone(),
            call_stack: ctx.call_stack.clone(),
            cancel: run_token.clone(),
        };

        let exec_started = Instant::now();
        let end = tokio::select! {
            result = agent.run(request) => RunEnd::Finished(result),
            () = tokio::time::sleep(ctx.timeout) => RunEnd::TimedOut,
            () = ctx.cancel.cancelled() => RunEnd::Cancelled,
        };
        metrics.execution_duration = exec_started.elapsed();

        let output = match end {
            RunEnd::Finished(Ok(output)) => output,
            RunEnd::Finished(Err(AgentError::Cancelled)) => {
                return Err(TaskError::new(ErrorKind::Cancelled, "agent run was stopped"));
            }
            RunEnd::Finished(Err(e)) => {
                return Err(TaskError::new(ErrorKind::ExecutionFailed, e.to_string()));
            }
            RunEnd::TimedOut => {
                run_token.cancel();
                agent.cancel(&session.id);
                return Err(TaskError::new(
                    ErrorKind::Timeout,
                    format!("task exceeded {}", format_duration(ctx.timeout)),
                ));
            }
            RunEnd::Cancelled => {
                agent.cancel(&session.id);
                return Err(TaskError::new(
                    ErrorKind::Cancelled,
                    "cancelled before the task completed",
                ));
            }
        };

        debug!(
            session_id = %session.id,
            iterations = output.iterations,
            tool_uses = output.tool_use_count,
            "Agent run finished"
        );

        metrics.tokens_used = output.usage.total();
        match self.rollup(&ctx.parent_session_id, &session.id).await {
            Ok(child) => {
                metrics.cost_incurred = child.cost;
                metrics.tokens_used = child.total_tokens();
            }
            Err(e) => {
                warn!(
                    parent_session_id = %ctx.parent_session_id,
                    session_id = %session.id,
                    error = %e,
                    "Cost rollup failed"
                );
            }
        }

        Ok(output.content)
    }

    async fn build_agent(&self, task: &TaskRequest) -> Result<Arc<dyn Agent>, TaskError> {
        let capability = self.registry.resolve(&task.subagent_type).ok_or_else(|| {
            TaskError::new(
                ErrorKind::AgentCreationFailed,
                format!("unknown subagent type '{}'", task.subagent_type),
            )
        })?;
        let tools = self.toolset.tools_for(capability).await;
        self.agents
            .build(capability, tools)
            .await
            .map_err(|e| TaskError::new(ErrorKind::AgentCreationFailed, e.to_string()))
    }

    async fn create_session(
        &self,
        task: &TaskRequest,
        ctx: &ExecutionContext,
        metrics: &mut TaskMetrics,
    ) -> Result<Session, TaskError> {
        let sessions = &self.sessions;
        let parent = ctx.parent_session_id.as_str();
        let title = task.description.as_str();

        let retry = self.retry.clone().unwrap_or_default();
        let started = Instant::now();
        let created = retry
            .run(&ctx.cancel, move |attempt| {
                debug!(attempt, parent_session_id = %parent, "Creating child session");
                sessions.create_child(parent, title)
            })
            .await;
        metrics.session_creation_duration = started.elapsed();

        match created {
            Ok((session, attempts)) => {
                metrics.retry_attempts = attempts - 1;
                Ok(session)
            }
            Err(e) => {
                metrics.retry_attempts = e.attempts().saturating_sub(1);
                Err(match e {
                    RetryError::Cancelled { .. } => TaskError::new(
                        ErrorKind::Cancelled,
                        "cancelled during session creation",
                    ),
                    RetryError::Exhausted { attempts, last } => TaskError::new(
                        ErrorKind::SessionCreationFailed,
                        format!("after {} attempts: {}", attempts, last),
                    ),
                })
            }
        }
    }

    /// Add the child's totals to the parent. Returns the child as read.
    async fn rollup(&self, parent_id: &str, child_id: &str) -> Result<Session, SessionError> {
        let child = self.sessions.get(child_id).await?;

        let _guard = self.rollup_lock.lock().await;
        let mut parent = self.sessions.get(parent_id).await?;
        parent.absorb(&child);
        self.sessions.save(parent).await?;
        Ok(child)
    }
}
