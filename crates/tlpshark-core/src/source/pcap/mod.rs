//! PCAP/PCAPNG source and writer.
//!
//! `PcapFileSource` reads legacy pcap and pcapng files and emits raw packet
//! events for the analysis pipeline. `writer` builds pcapng files in the
//! layout analyzer exports use (link type USER11, nanosecond timestamps,
//! one analyzer record per Enhanced Packet Block).

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;
pub mod writer;

pub use parser::PcapFileSource;
pub use writer::{CaptureRecordBuilder, PcapngWriter};
