use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    #[error("Callback count must be >= 1")]
    BadCount(i64),

    #[error("Callback must not be undefined or null. Value specified was {repr}.")]
    MissingCallback { repr: String },

    // only raised under OverflowPolicy::Reject
    #[error("Barrier {label} already completed after {target} calls")]
    ReentrantCompletion { label: String, target: usize },
}

impl BarrierError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            BarrierError::BadCount(_) | BarrierError::MissingCallback { .. }
        )
    }
}

impl From<BarrierError> for String {
    fn from(error: BarrierError) -> Self {
        error.to_string()
    }
}
