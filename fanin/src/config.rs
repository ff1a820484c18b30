//! Construction options for a `CountedCallback`.
//!
//! The target count and completion callback are always passed explicitly;
//! `BarrierConfig` only carries the knobs that have a sensible default:
//! - `overflow`: what happens to calls that arrive after the barrier fired
//! - `label`: a name used in log lines and in `ReentrantCompletion` errors
//!
//! ```
//! use fanin::config::{BarrierConfig, OverflowPolicy};
//!
//! let config = BarrierConfig::default()
//!     .with_label("fetch-shards")
//!     .with_overflow(OverflowPolicy::Reject);
//! assert_eq!(config.label(), "fetch-shards");
//! ```

/// Policy for join-handle calls made after the completion callback fired.
///
/// Under either policy the extra call is not recorded and the completion
/// callback never runs a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the call and log a warning.
    #[default]
    Ignore,
    /// Fail the call with `BarrierError::ReentrantCompletion`.
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(OverflowPolicy::Ignore),
            "reject" => Ok(OverflowPolicy::Reject),
            _ => Err(format!("Invalid overflow policy: {}", s)),
        }
    }
}

const DEFAULT_LABEL: &str = "counted-callback";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierConfig {
    pub overflow: OverflowPolicy,
    pub label: Option<String>,
}

impl BarrierConfig {
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }
}
