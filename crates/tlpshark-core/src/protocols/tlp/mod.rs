//! Transaction Layer Packet decoding.
//!
//! The Fmt/Type byte is classified once into a [`TlpKind`]; memory, I/O,
//! configuration, message and completion TLPs then get a typed
//! [`TlpBody`]. Other kinds (atomics, locked reads, prefixes) are named but
//! not interpreted further. Payload DWORDs and the optional ECRC are only
//! read for the interpreted kinds.

pub mod error;
pub mod kind;
pub mod layout;
pub mod parser;

pub use error::TlpError;
pub use kind::{
    CompletionStatus, TlpKind, config_register_name, message_code_name, message_routing_name,
};
pub use parser::{
    EcrcCheck, RequestHeader, Tlp, TlpBody, TlpHeader, decode_tlp, transaction_id, wire_len,
};
