// ABOUTME: TaskRequest, BatchRequest, and AggregateMode plus validation of raw tool input.
// ABOUTME: Validation either accepts the whole request or rejects it before anything runs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::parse_duration;
use crate::agent::CapabilityRegistry;
use crate::config::DelegateConfig;
use crate::error::ValidationError;

/// One validated unit of delegated work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRequest {
    /// Short label, trimmed.
    pub description: String,
    pub prompt: String,
    pub subagent_type: String,
}

/// How batch outcomes are reduced into one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    #[default]
    Concat,
    JsonArray,
    Summary,
}

impl AggregateMode {
    pub const ALL: [AggregateMode; 3] = [
        AggregateMode::Concat,
        AggregateMode::JsonArray,
        AggregateMode::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateMode::Concat => "concat",
            AggregateMode::JsonArray => "json_array",
            AggregateMode::Summary => "summary",
        }
    }
}

impl fmt::Display for AggregateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAggregateMode(s.to_string()))
    }
}

/// A validated batch of two or more tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub tasks: Vec<TaskRequest>,

    /// Always within `1..=tasks.len()`.
    pub max_workers: usize,

    pub aggregate_mode: AggregateMode,

    /// Deadline for the batch as a whole.
    pub timeout: Duration,
}

/// A request ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    Single { task: TaskRequest, timeout: Duration },
    Batch(BatchRequest),
}

impl ValidatedRequest {
    pub fn task_count(&self) -> usize {
        match self {
            ValidatedRequest::Single { .. } => 1,
            ValidatedRequest::Batch(batch) => batch.tasks.len(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTask {
    description: Option<String>,
    prompt: Option<String>,
    subagent_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    #[serde(flatten)]
    task: RawTask,
    tasks: Option<Vec<RawTask>>,
    max_workers: Option<i64>,
    aggregate_mode: Option<String>,
    timeout: Option<String>,
}

/// Validate raw `task` tool parameters.
///
/// A payload with a `tasks` array is a batch; anything else is read as the
/// single-task shape. A batch holding exactly one task is returned as
/// [`ValidatedRequest::Single`].
pub fn validate(
    params: &serde_json::Value,
    registry: &CapabilityRegistry,
    config: &DelegateConfig,
) -> Result<ValidatedRequest, ValidationError> {
    if !params.is_object() {
        return Err(ValidationError::Malformed(
            "parameters must be a JSON object".into(),
        ));
    }
    let raw = RawParams::deserialize(params)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let explicit_timeout = raw.timeout.as_deref().map(parse_timeout).transpose()?;
    let aggregate_mode = match raw.aggregate_mode.as_deref() {
        Some(mode) => mode.parse()?,
        None => AggregateMode::default(),
    };

    let Some(raw_tasks) = raw.tasks else {
        let task = validate_task(raw.task, None, registry)?;
        return Ok(ValidatedRequest::Single {
            task,
            timeout: explicit_timeout.unwrap_or(config.single_task_timeout),
        });
    };

    if raw_tasks.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let tasks = raw_tasks
        .into_iter()
        .enumerate()
        .map(|(i, t)| validate_task(t, Some(i), registry))
        .collect::<Result<Vec<_>, _>>()?;

    if tasks.len() == 1 {
        let task = tasks.into_iter().next().ok_or(ValidationError::EmptyBatch)?;
        return Ok(ValidatedRequest::Single {
            task,
            timeout: explicit_timeout.unwrap_or(config.single_task_timeout),
        });
    }

    let max_workers = match raw.max_workers {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => config.default_max_workers,
    }
    .clamp(1, tasks.len());

    Ok(ValidatedRequest::Batch(BatchRequest {
        tasks,
        max_workers,
        aggregate_mode,
        timeout: explicit_timeout.unwrap_or(config.batch_timeout),
    }))
}

fn validate_task(
    raw: RawTask,
    task: Option<usize>,
    registry: &CapabilityRegistry,
) -> Result<TaskRequest, ValidationError> {
    let description = required(raw.description, task, "description")?;
    let prompt = required(raw.prompt, task, "prompt")?;
    let subagent_type = required(raw.subagent_type, task, "subagent_type")?;

    let subagent_type = subagent_type.trim().to_string();
    if registry.resolve(&subagent_type).is_none() {
        return Err(ValidationError::UnknownSubagentType {
            task,
            name: subagent_type,
            valid: registry.names(),
        });
    }

    Ok(TaskRequest {
        description: description.trim().to_string(),
        prompt,
        subagent_type,
    })
}

fn required(
    value: Option<String>,
    task: Option<usize>,
    field: &'static str,
) -> Result<String, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField { task, field }),
        Some(v) if v.trim().is_empty() => Err(ValidationError::EmptyField { task, field }),
        Some(v) => Ok(v),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ValidationError> {
    parse_duration(value).map_err(|e| ValidationError::InvalidTimeout {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
