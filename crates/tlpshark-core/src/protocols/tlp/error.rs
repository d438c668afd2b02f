use thiserror::Error;

use crate::protocols::common::BoundsError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlpError {
    #[error("TLP too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error(transparent)]
    Bounds(BoundsError),
}

impl From<BoundsError> for TlpError {
    fn from(value: BoundsError) -> Self {
        match value {
            BoundsError::TooShort { needed, actual } => TlpError::TooShort { needed, actual },
            other => TlpError::Bounds(other),
        }
    }
}
