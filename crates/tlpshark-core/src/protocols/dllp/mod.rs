//! Data Link Layer Packet decoding.
//!
//! A DLLP is six bytes on the wire: a type byte, three content bytes whose
//! meaning depends on the type, and a little-endian CRC-16 over the first
//! four bytes. The CRC is checked for every type, including unknown ones;
//! a mismatch is reported as a warning and never stops decoding.

pub mod error;
pub mod layout;
pub mod parser;

pub use error::DllpError;
pub use parser::{
    CreditClass, Dllp, DllpKind, DllpPayload, FcKind, FlowControlCredits, decode_dllp,
};
