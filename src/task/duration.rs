// ABOUTME: Go-style duration strings ("90s", "1h30m", "1.5h", "250ms").
// ABOUTME: Used for request timeouts and for timeouts in DelegateConfig.

use std::time::Duration;

/// Why a duration string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid number in '{0}'")]
    InvalidNumber(String),

    #[error("missing unit in '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("duration must be positive")]
    NotPositive,

    #[error("duration out of range")]
    OutOfRange,
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a positive duration such as `"30m"` or `"1h15m30s"`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, after) = rest.split_at(number_len);
        if number.is_empty() || !number.bytes().any(|b| b.is_ascii_digit()) {
            return Err(DurationError::InvalidNumber(s.to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| DurationError::InvalidNumber(s.to_string()))?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(s.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit(unit.to_string()))?;

        total += value * scale;
        rest = after;
    }

    if total <= 0.0 {
        return Err(DurationError::NotPositive);
    }
    if total >= u64::MAX as f64 {
        return Err(DurationError::OutOfRange);
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    if secs == 0 && nanos == 0 {
        return "0s".to_string();
    }
    if nanos == 0 {
        if secs % 3600 == 0 {
            return format!("{}h", secs / 3600);
        }
        if secs % 60 == 0 {
            return format!("{}m", secs / 60);
        }
        return format!("{}s", secs);
    }
    if nanos % 1_000_000 == 0 {
        return format!("{}ms", d.as_millis());
    }
    format!("{}ns", d.as_nanos())
}
