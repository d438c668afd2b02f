//! Protocol decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and bit fields (source of truth)
//! - `parser`: domain-level decoding through `ByteReader`, no direct indexing
//! - `error`: explicit, actionable errors
//!
//! Decoders are pure: bytes in, typed values and warnings out. Transaction
//! tracking and aggregation live in `analysis`.

pub mod capture;
pub mod common;
pub mod crc;
pub mod dllp;
pub mod frame;
pub mod symbols;
pub mod tlp;
pub mod warning;
