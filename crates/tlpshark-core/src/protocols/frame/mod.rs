//! Physical-layer framing.
//!
//! A capture unit starts with a K-symbol: STP introduces a TLP (sequence
//! number, TLP, LCRC, END/EDB), SDP a DLLP (six bytes, END) and COM an
//! ordered set. The TLP length comes from peeking DW0, and the whole frame
//! is bounds-checked before the TLP itself is decoded.

pub mod encode;
pub mod error;
pub mod layout;
pub mod ordered_set;
pub mod parser;

pub use error::FrameError;
pub use ordered_set::{
    DataRate, OrderedSet, TrainingControl, TrainingFields, TrainingSequence, TsKind,
};
pub use parser::{DllpFrame, Frame, IntegrityChecks, TlpFrame, decode_frame};
