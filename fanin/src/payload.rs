//! Argument values recorded by a `CountedCallback`.
//!
//! A join-handle call carries an ordered list of `Payload`s. By convention the
//! first slot is where an operation reports its failure, and every other slot
//! is opaque data forwarded to the completion callback untouched.

use std::fmt;

/// One positional argument of a join-handle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<T> {
    /// A failure, kept only as its human-readable message.
    Error(String),
    /// An ordinary value.
    Value(T),
    /// An explicitly empty slot, e.g. the "no error" first argument of a
    /// successful call.
    Absent,
}

impl<T> Payload<T> {
    /// Builds an `Error` payload from anything displayable.
    pub fn error<E: fmt::Display>(e: E) -> Self {
        Payload::Error(e.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Payload::Absent)
    }

    /// Returns the error message if this is an `Error` payload.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Payload::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Payload<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Payload::Value(v),
            None => Payload::Absent,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Payload<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Error(msg) => write!(f, "Error({})", msg),
            Payload::Value(v) => write!(f, "{}", v),
            Payload::Absent => write!(f, "<absent>"),
        }
    }
}
