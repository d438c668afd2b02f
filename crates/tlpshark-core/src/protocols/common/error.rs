use thiserror::Error;

/// Out-of-range access into a captured byte span.
///
/// Decoders treat this as fatal for the frame being decoded only; the
/// caller moves on to the next capture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("buffer too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("invalid bit width {width} (expected 1..=64)")]
    InvalidWidth { width: u32 },
}
