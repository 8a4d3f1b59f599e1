// ABOUTME: Session type - one conversation with its accumulated cost and
// ABOUTME: token counts, optionally linked to the parent that spawned it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    /// Session that spawned this one, for subagent sessions.
    pub parent_id: Option<String>,

    pub title: String,

    /// Accumulated cost in USD.
    pub cost: f64,

    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id: None,
            title: title.into(),
            cost: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn child_of(parent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::new(title)
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Add one model response's usage and cost.
    pub fn record_usage(&mut self, usage: &Usage, cost: f64) {
        self.prompt_tokens += usage.input_tokens;
        self.completion_tokens += usage.output_tokens;
        self.cost += cost;
        self.updated_at = Utc::now();
    }

    /// Fold a finished child session's totals into this one.
    pub fn absorb(&mut self, child: &Session) {
        self.prompt_tokens += child.prompt_tokens;
        self.completion_tokens += child.completion_tokens;
        self.cost += child.cost;
        self.updated_at = Utc::now();
    }
}
