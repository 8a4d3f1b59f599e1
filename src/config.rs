// ABOUTME: DelegateConfig - timeouts, worker cap, retry tuning, and summary sizing.
// ABOUTME: Layered as defaults, then a JSON document, then DELEGATE_* environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DelegateError;
use crate::task::{format_duration, parse_duration};

/// Configuration for task execution and batching.
///
/// Durations are written as Go-style strings (`"30m"`, `"1h30m"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    /// Execution deadline for a task run on its own.
    #[serde(with = "duration_str")]
    pub single_task_timeout: Duration,

    /// Execution deadline for each item of a batch.
    #[serde(with = "duration_str")]
    pub batch_item_timeout: Duration,

    /// Deadline for a whole batch when the request names none.
    #[serde(with = "duration_str")]
    pub batch_timeout: Duration,

    /// Upper bound for the default worker count of a batch.
    pub default_max_workers: usize,

    /// Session-creation retry tuning.
    pub retry: RetryConfig,

    /// Maximum characters per task line in `summary` output.
    pub summary_excerpt_chars: usize,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            single_task_timeout: Duration::from_secs(30 * 60),
            batch_item_timeout: Duration::from_secs(10 * 60),
            batch_timeout: Duration::from_secs(30 * 60),
            default_max_workers: 5,
            retry: RetryConfig::default(),
            summary_excerpt_chars: 200,
        }
    }
}

/// Retry settings for isolated session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,

    /// Backoff before attempt `n + 1` is `base_backoff * n^2`.
    #[serde(with = "duration_str")]
    pub base_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl DelegateConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, DelegateError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DelegateError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DelegateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DelegateError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Apply `DELEGATE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, DelegateError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, DelegateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let duration = |key: &str| -> Result<Option<Duration>, DelegateError> {
            lookup(key)
                .map(|v| parse_duration(&v).map_err(|e| DelegateError::Config(format!("{key}: {e}"))))
                .transpose()
        };
        let number = |key: &str| -> Result<Option<u64>, DelegateError> {
            lookup(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|e| DelegateError::Config(format!("{key}: {e}")))
                })
                .transpose()
        };

        if let Some(d) = duration("DELEGATE_SINGLE_TASK_TIMEOUT")? {
            self.single_task_timeout = d;
        }
        if let Some(d) = duration("DELEGATE_BATCH_ITEM_TIMEOUT")? {
            self.batch_item_timeout = d;
        }
        if let Some(d) = duration("DELEGATE_BATCH_TIMEOUT")? {
            self.batch_timeout = d;
        }
        if let Some(n) = number("DELEGATE_MAX_WORKERS")? {
            self.default_max_workers = usize::try_from(n)
                .map_err(|e| DelegateError::Config(format!("DELEGATE_MAX_WORKERS: {e}")))?;
        }
        if let Some(n) = number("DELEGATE_RETRY_ATTEMPTS")? {
            self.retry.max_attempts = u32::try_from(n)
                .map_err(|e| DelegateError::Config(format!("DELEGATE_RETRY_ATTEMPTS: {e}")))?;
        }
        if let Some(d) = duration("DELEGATE_RETRY_BACKOFF")? {
            self.retry.base_backoff = d;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, DelegateError> {
        if self.default_max_workers == 0 {
            return Err(DelegateError::Config(
                "default_max_workers must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DelegateError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.summary_excerpt_chars < 4 {
            return Err(DelegateError::Config(
                "summary_excerpt_chars must be at least 4".into(),
            ));
        }
        Ok(self)
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_duration, parse_duration};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
