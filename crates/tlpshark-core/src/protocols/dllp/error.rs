use thiserror::Error;

use crate::protocols::common::BoundsError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DllpError {
    #[error("DLLP too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error(transparent)]
    Bounds(BoundsError),
}

impl From<BoundsError> for DllpError {
    fn from(value: BoundsError) -> Self {
        match value {
            BoundsError::TooShort { needed, actual } => DllpError::TooShort { needed, actual },
            other => DllpError::Bounds(other),
        }
    }
}
