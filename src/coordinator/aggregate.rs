// ABOUTME: Aggregator - reduces ordered task outcomes into one response body.
// ABOUTME: Supports concat (text report), json_array, and summary (counts plus one line per task).

use std::fmt::Write as _;

use serde::Serialize;

use super::controller::TaskOutcome;
use super::metrics::TaskMetrics;
use crate::error::{AggregationError, ErrorKind};
use crate::task::AggregateMode;

#[derive(Serialize)]
struct JsonItem<'a> {
    task_index: usize,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    metrics: &'a TaskMetrics,
}

/// Reduces batch outcomes according to an [`AggregateMode`].
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    excerpt_chars: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Aggregator {
    /// `excerpt_chars` caps each per-task line in summary mode.
    pub fn new(excerpt_chars: usize) -> Self {
        Self {
            excerpt_chars: excerpt_chars.max(4),
        }
    }

    /// Aggregate `outcomes`, which must hold exactly `expected` entries in task order.
    pub fn aggregate(
        &self,
        mode: AggregateMode,
        outcomes: &[TaskOutcome],
        expected: usize,
    ) -> Result<String, AggregationError> {
        if outcomes.len() != expected {
            return Err(AggregationError::Incomplete {
                expected,
                actual: outcomes.len(),
            });
        }
        match mode {
            AggregateMode::Concat => Ok(self.concat(outcomes)),
            AggregateMode::JsonArray => self.json_array(outcomes),
            AggregateMode::Summary => Ok(self.summary(outcomes)),
        }
    }

    fn concat(&self, outcomes: &[TaskOutcome]) -> String {
        let mut out = String::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = match &outcome.error {
                Some(err) => writeln!(out, "Task {} FAILED: {}", outcome.task_index, err),
                None => writeln!(
                    out,
                    "Task {} Result:\n{}",
                    outcome.task_index,
                    outcome.result.as_deref().unwrap_or_default()
                ),
            };
        }
        out
    }

    fn json_array(&self, outcomes: &[TaskOutcome]) -> Result<String, AggregationError> {
        let items: Vec<JsonItem<'_>> = outcomes
            .iter()
            .map(|o| JsonItem {
                task_index: o.task_index,
                success: o.is_success(),
                result: o
                    .is_success()
                    .then(|| o.result.as_deref().unwrap_or_default()),
                error: o.error.as_ref().map(|e| e.message.clone()),
                error_kind: o.error.as_ref().map(|e| e.kind),
                metrics: &o.metrics,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&items)?)
    }

    fn summary(&self, outcomes: &[TaskOutcome]) -> String {
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let mut out = format!(
            "Total Tasks: {}\nSuccessful: {}\nFailed: {}\n\n",
            outcomes.len(),
            successful,
            outcomes.len() - successful
        );

        for outcome in outcomes {
            let line = match &outcome.error {
                Some(err) => format!("Task {} FAILED: {}", outcome.task_index, err),
                None => format!(
                    "Task {} OK: {}",
                    outcome.task_index,
                    outcome.result.as_deref().unwrap_or_default()
                ),
            };
            out.push_str(&truncate_line(&line, self.excerpt_chars));
            out.push('\n');
        }
        out
    }
}

/// Flatten to one line and cap at `max` characters, marking cuts with "...".
fn truncate_line(line: &str, max: usize) -> String {
    let flat: String = line
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
