use thiserror::Error;

use crate::protocols::common::BoundsError;
use crate::protocols::dllp::DllpError;
use crate::protocols::tlp::TlpError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error(transparent)]
    Bounds(BoundsError),
    #[error("TLP: {0}")]
    Tlp(#[from] TlpError),
    #[error("DLLP: {0}")]
    Dllp(#[from] DllpError),
}

impl From<BoundsError> for FrameError {
    fn from(value: BoundsError) -> Self {
        match value {
            BoundsError::TooShort { needed, actual } => FrameError::TooShort { needed, actual },
            other => FrameError::Bounds(other),
        }
    }
}
