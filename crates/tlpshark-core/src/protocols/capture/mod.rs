//! Analyzer capture records.
//!
//! Each record carries a 20-byte little-endian header (record number,
//! timestamp, LFSR, metadata info, flags) followed by the frame bytes and,
//! on newer analyzers, 8b/10b and LFSR metadata. Only the frame bytes are
//! handed to the frame decoder; the rest is exposed as typed values.

pub mod error;
pub mod layout;
pub mod parser;

pub use error::CaptureError;
pub use parser::{
    CaptureFlags, CaptureRecord, Direction, LfsrBlock, MetadataInfo, RecordHeader, SymbolMeta,
    decode_capture_record, symbol_meta_len,
};
