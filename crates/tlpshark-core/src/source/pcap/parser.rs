use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};
use tracing::{debug, warn};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_pcapng_magic, linktype_for_interface, pcapng_ts_to_seconds, read_magic_and_rewind,
};

pub struct PcapFileSource {
    inner: PcapReader,
}

struct LegacyState {
    linktype: Option<Linktype>,
    nanosecond: bool,
}

/// Per-section interface table; reset on every Section Header Block.
#[derive(Default)]
struct InterfaceTable {
    linktypes: Vec<Linktype>,
    tsresols: Vec<u8>,
}

impl InterfaceTable {
    fn clear(&mut self) {
        self.linktypes.clear();
        self.tsresols.clear();
    }

    fn push(&mut self, linktype: Linktype, tsresol: u8) {
        self.linktypes.push(linktype);
        self.tsresols.push(tsresol);
    }

    fn tsresol(&self, if_id: u32) -> u8 {
        self.tsresols
            .get(if_id as usize)
            .copied()
            .unwrap_or(layout::TSRESOL_DEFAULT)
    }
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        state: LegacyState,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: InterfaceTable,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        next_packet(&mut self.inner).map_err(SourceError::from)
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            interfaces: InterfaceTable::default(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            state: LegacyState {
                linktype: None,
                nanosecond: false,
            },
        })
    }
}

fn next_packet(reader: &mut PcapReader) -> Result<Option<PacketEvent>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy { reader, state } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            state.linktype = Some(header.network);
                            state.nanosecond = header.is_nanosecond_precision();
                            debug!(
                                linktype = header.network.0,
                                nanosecond = state.nanosecond,
                                "pcap header"
                            );
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let scale = if state.nanosecond { 1e-9 } else { 1e-6 };
                            let ts = f64::from(packet.ts_sec) + f64::from(packet.ts_usec) * scale;
                            Some(PacketEvent {
                                ts: Some(ts),
                                interface: 0,
                                linktype: state.linktype,
                                data: packet.data.to_vec(),
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, interfaces } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            interfaces.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            debug!(
                                interface = interfaces.linktypes.len(),
                                linktype = intf.linktype.0,
                                tsresol = intf.if_tsresol,
                                "pcapng interface"
                            );
                            interfaces.push(intf.linktype, intf.if_tsresol);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let linktype =
                                linktype_for_interface(&interfaces.linktypes, packet.if_id);
                            if linktype.is_none() {
                                warn!(interface = packet.if_id, "packet on undescribed interface");
                            }
                            let ts = pcapng_ts_to_seconds(
                                packet.ts_high,
                                packet.ts_low,
                                interfaces.tsresol(packet.if_id),
                            );
                            // Block data carries the 32-bit alignment padding.
                            let caplen = (packet.caplen as usize).min(packet.data.len());
                            Some(PacketEvent {
                                ts,
                                interface: packet.if_id,
                                linktype,
                                data: packet.data[..caplen].to_vec(),
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
