pub mod pcap;

pub use pcap::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;

/// One captured packet as delivered by a `PacketSource`.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture timestamp in seconds, honouring the interface resolution.
    pub ts: Option<f64>,
    /// Interface the packet was captured on; always 0 for legacy pcap.
    pub interface: u32,
    /// `None` when the packet refers to an interface that was never described.
    pub linktype: Option<Linktype>,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
