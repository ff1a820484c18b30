//! Error collation for a completed barrier.
//!
//! Only the first argument of each recorded call is inspected. The messages of
//! every `Payload::Error` found there are joined with newlines in arrival order
//! and wrapped in one `CollatedError`. The individual errors are not kept.

use crate::payload::Payload;
use thiserror::Error;

/// The single error handed to a completion callback when at least one call
/// reported a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollatedError {
    message: String,
    error_count: usize,
}

impl CollatedError {
    /// The newline-joined messages, trailing whitespace trimmed.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// How many calls had an error as their first argument.
    pub fn error_count(&self) -> usize {
        self.error_count
    }
}

impl From<CollatedError> for String {
    fn from(error: CollatedError) -> Self {
        error.message
    }
}

/// Collates the errors found in `calls`, returning `None` when no call had an
/// error as its first argument.
pub fn collate_errors<T>(calls: &[Vec<Payload<T>>]) -> Option<CollatedError> {
    let mut buf = String::new();
    let mut error_count = 0;
    for msg in calls
        .iter()
        .filter_map(|args| args.first().and_then(Payload::error_message))
    {
        buf.push_str(msg);
        buf.push('\n');
        error_count += 1;
    }
    if buf.is_empty() {
        return None;
    }
    buf.truncate(buf.trim_end().len());
    Some(CollatedError {
        message: buf,
        error_count,
    })
}
