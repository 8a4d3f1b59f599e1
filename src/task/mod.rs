// ABOUTME: Task request module - parses raw tool parameters into validated requests.
// ABOUTME: Also owns the duration-string format used for timeouts.

mod duration;
mod request;

pub use duration::{DurationError, format_duration, parse_duration};
pub use request::{AggregateMode, BatchRequest, TaskRequest, ValidatedRequest, validate};
