use thiserror::Error;

use crate::protocols::common::BoundsError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("capture record too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error(transparent)]
    Bounds(BoundsError),
}

impl From<BoundsError> for CaptureError {
    fn from(value: BoundsError) -> Self {
        match value {
            BoundsError::TooShort { needed, actual } => CaptureError::TooShort { needed, actual },
            other => CaptureError::Bounds(other),
        }
    }
}
