//! pcapng block builders and a streaming writer for analyzer captures.
//!
//! The builders return complete blocks as `Vec<u8>`; `PcapngWriter` writes
//! them to any `io::Write` in order (SHB, IDBs, EPBs).

use std::io::Write;

use crate::protocols::capture::Direction;
use crate::protocols::capture::layout as record_layout;

use super::error::PcapSourceError;
use super::layout;

/// Build a Section Header Block.
pub fn section_header_block(user_appl: &str) -> Result<Vec<u8>, PcapSourceError> {
    let mut body = Vec::new();
    body.extend_from_slice(&layout::BYTE_ORDER_MAGIC.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes()); // major
    body.extend_from_slice(&0u16.to_le_bytes()); // minor
    body.extend_from_slice(&u64::MAX.to_le_bytes()); // section length unspecified

    let mut opts = Vec::new();
    write_opt(&mut opts, layout::OPT_SHB_USERAPPL, user_appl.as_bytes())?;
    write_opt_end(&mut opts);

    build_block(layout::BLOCK_TYPE_SECTION_HEADER, &body, &opts)
}

/// Build an Interface Description Block with nanosecond timestamps.
pub fn interface_description_block(
    linktype: pcap_parser::Linktype,
    name: &str,
) -> Result<Vec<u8>, PcapSourceError> {
    let linktype = u16::try_from(linktype.0).map_err(|_| encode_error("linktype out of range"))?;

    let mut body = Vec::new();
    body.extend_from_slice(&linktype.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes()); // reserved
    body.extend_from_slice(&0u32.to_le_bytes()); // snaplen: unlimited

    let mut opts = Vec::new();
    write_opt(&mut opts, layout::OPT_IF_NAME, name.as_bytes())?;
    write_opt(&mut opts, layout::OPT_IF_TSRESOL, &[layout::TSRESOL_NANOSECONDS])?;
    write_opt_end(&mut opts);

    build_block(layout::BLOCK_TYPE_INTERFACE_DESCRIPTION, &body, &opts)
}

/// Build an Enhanced Packet Block. `timestamp_ns` assumes `if_tsresol` 9.
pub fn enhanced_packet_block(
    interface_id: u32,
    timestamp_ns: u64,
    payload: &[u8],
) -> Result<Vec<u8>, PcapSourceError> {
    let cap_len =
        u32::try_from(payload.len()).map_err(|_| encode_error("packet too large"))?;

    let mut body = Vec::with_capacity(20 + payload.len() + 3);
    body.extend_from_slice(&interface_id.to_le_bytes());
    body.extend_from_slice(&((timestamp_ns >> 32) as u32).to_le_bytes());
    body.extend_from_slice(&(timestamp_ns as u32).to_le_bytes());
    body.extend_from_slice(&cap_len.to_le_bytes());
    body.extend_from_slice(&cap_len.to_le_bytes());
    body.extend_from_slice(payload);
    pad_to_32(&mut body);

    let mut opts = Vec::new();
    write_opt_end(&mut opts);

    build_block(layout::BLOCK_TYPE_ENHANCED_PACKET, &body, &opts)
}

fn pad_to_32(buf: &mut Vec<u8>) {
    let pad_len = (4 - (buf.len() % 4)) % 4;
    buf.extend(std::iter::repeat_n(0u8, pad_len));
}

fn build_block(block_type: u32, body: &[u8], opts: &[u8]) -> Result<Vec<u8>, PcapSourceError> {
    let total_len = layout::BLOCK_OVERHEAD + body.len() + opts.len();
    let total_len_u32 =
        u32::try_from(total_len).map_err(|_| encode_error("pcapng block too large"))?;

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&total_len_u32.to_le_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(opts);
    out.extend_from_slice(&total_len_u32.to_le_bytes());
    Ok(out)
}

fn write_opt_end(out: &mut Vec<u8>) {
    out.extend_from_slice(&layout::OPT_END.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
}

fn write_opt(out: &mut Vec<u8>, code: u16, val: &[u8]) -> Result<(), PcapSourceError> {
    let len = u16::try_from(val.len()).map_err(|_| encode_error("pcapng option too large"))?;
    out.extend_from_slice(&code.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(val);
    pad_to_32(out);
    Ok(())
}

fn encode_error(message: &str) -> PcapSourceError {
    PcapSourceError::Pcap {
        context: "pcapng writer",
        message: message.to_string(),
    }
}

/// One analyzer record: the 20-byte header followed by the frame bytes and
/// any trailing metadata.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::capture::{Direction, decode_capture_record};
/// use tlpshark_core::source::pcap::CaptureRecordBuilder;
///
/// let bytes = CaptureRecordBuilder::new(7, 1_500)
///     .direction(Direction::Upstream)
///     .frame(&[0xBC, 0x1C, 0x1C, 0x1C])
///     .build()
///     .unwrap();
/// let record = decode_capture_record(&bytes).unwrap();
/// assert_eq!(record.header.record, 7);
/// assert_eq!(record.direction(), Direction::Upstream);
/// assert_eq!(record.frame, &[0xBC, 0x1C, 0x1C, 0x1C]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaptureRecordBuilder {
    record: u32,
    timestamp_ns: u64,
    flags: u32,
    lfsr: u16,
    extra_metadata: bool,
    metadata: Option<Vec<u8>>,
    frame: Vec<u8>,
}

impl CaptureRecordBuilder {
    pub fn new(record: u32, timestamp_ns: u64) -> Self {
        Self {
            record,
            timestamp_ns,
            ..Self::default()
        }
    }

    /// Replace the whole flags word.
    pub fn flags(mut self, raw: u32) -> Self {
        self.flags = raw;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        match direction {
            Direction::Upstream => self.flags |= record_layout::FLAG_DIRECTION_UPSTREAM,
            Direction::Downstream => self.flags &= !record_layout::FLAG_DIRECTION_UPSTREAM,
        }
        self
    }

    /// Link speed code (1 = 2.5 GT/s, 3 = 5.0 GT/s) and width code
    /// (0 = x1 .. 4 = x16).
    pub fn link(mut self, speed: u8, width: u8) -> Self {
        self.flags &= !(record_layout::FLAG_LINK_SPEED_MASK | record_layout::FLAG_LINK_WIDTH_MASK);
        self.flags |= (u32::from(speed) << record_layout::FLAG_LINK_SPEED_SHIFT)
            & record_layout::FLAG_LINK_SPEED_MASK;
        self.flags |= u32::from(width) & record_layout::FLAG_LINK_WIDTH_MASK;
        self
    }

    pub fn frame(mut self, bytes: &[u8]) -> Self {
        self.frame = bytes.to_vec();
        self
    }

    /// Append metadata after the frame. The header then records the frame
    /// length as the metadata offset; `lfsr` must be nonzero for a reader to
    /// look at either field.
    pub fn metadata(mut self, lfsr: u16, extra_metadata: bool, bytes: &[u8]) -> Self {
        self.lfsr = lfsr;
        self.extra_metadata = extra_metadata;
        self.metadata = Some(bytes.to_vec());
        self
    }

    /// # Errors
    /// Fails when metadata is attached and the frame is too long for the
    /// 15-bit metadata offset.
    pub fn build(&self) -> Result<Vec<u8>, PcapSourceError> {
        let info = match &self.metadata {
            Some(_) => {
                let offset = u16::try_from(self.frame.len())
                    .ok()
                    .filter(|offset| *offset <= record_layout::METADATA_OFFSET_MASK)
                    .ok_or_else(|| encode_error("frame too long for metadata offset"))?;
                if self.extra_metadata {
                    offset | record_layout::EXTRA_METADATA_PRESENT
                } else {
                    offset
                }
            }
            None => 0,
        };

        let trailer = self.metadata.as_deref().unwrap_or(&[]);
        let mut out =
            Vec::with_capacity(record_layout::HEADER_LEN + self.frame.len() + trailer.len());
        out.extend_from_slice(&self.record.to_le_bytes());
        out.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        out.extend_from_slice(&self.lfsr.to_le_bytes());
        out.extend_from_slice(&info.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.frame);
        out.extend_from_slice(trailer);
        Ok(out)
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }
}

/// Streams a pcapng section to `W`.
pub struct PcapngWriter<W: Write> {
    out: W,
    interfaces: u32,
}

impl<W: Write> PcapngWriter<W> {
    /// Write the Section Header Block.
    pub fn new(mut out: W, user_appl: &str) -> Result<Self, PcapSourceError> {
        out.write_all(&section_header_block(user_appl)?)?;
        Ok(Self { out, interfaces: 0 })
    }

    /// Describe one analyzer link; returns its interface id.
    pub fn add_interface(&mut self, name: &str) -> Result<u32, PcapSourceError> {
        self.add_interface_with_linktype(layout::LINKTYPE_PCIE_CAPTURE, name)
    }

    pub fn add_interface_with_linktype(
        &mut self,
        linktype: pcap_parser::Linktype,
        name: &str,
    ) -> Result<u32, PcapSourceError> {
        self.out
            .write_all(&interface_description_block(linktype, name)?)?;
        let id = self.interfaces;
        self.interfaces += 1;
        Ok(id)
    }

    pub fn write_packet(
        &mut self,
        interface_id: u32,
        timestamp_ns: u64,
        data: &[u8],
    ) -> Result<(), PcapSourceError> {
        self.out
            .write_all(&enhanced_packet_block(interface_id, timestamp_ns, data)?)?;
        Ok(())
    }

    /// Write a record, stamping the block with the record's own timestamp.
    pub fn write_record(
        &mut self,
        interface_id: u32,
        record: &CaptureRecordBuilder,
    ) -> Result<(), PcapSourceError> {
        self.write_packet(interface_id, record.timestamp_ns(), &record.build()?)
    }

    pub fn finish(mut self) -> Result<W, PcapSourceError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::capture::decode_capture_record;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn section_header_block_has_expected_fields() {
        let bytes = section_header_block("tlpshark-test").unwrap();
        assert_eq!(read_u32(&bytes, 0), layout::BLOCK_TYPE_SECTION_HEADER);
        let total_len = read_u32(&bytes, 4) as usize;
        assert_eq!(bytes.len(), total_len);
        assert_eq!(read_u32(&bytes, total_len - 4) as usize, total_len);
        assert_eq!(read_u32(&bytes, 8), layout::BYTE_ORDER_MAGIC);
    }

    #[test]
    fn interface_block_sets_linktype_and_tsresol() {
        let bytes = interface_description_block(layout::LINKTYPE_PCIE_CAPTURE, "x4").unwrap();
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 158);
        // if_name "x4" padded to four bytes, then if_tsresol.
        let tsresol_opt = 16 + 8;
        assert_eq!(
            u16::from_le_bytes([bytes[tsresol_opt], bytes[tsresol_opt + 1]]),
            layout::OPT_IF_TSRESOL
        );
        assert_eq!(bytes[tsresol_opt + 4], layout::TSRESOL_NANOSECONDS);
    }

    #[test]
    fn enhanced_packet_block_pads_payload() {
        let payload = [0xAAu8; 7];
        let bytes = enhanced_packet_block(3, 0x1122_3344_5566_7788, &payload).unwrap();
        let total_len = read_u32(&bytes, 4) as usize;
        assert_eq!(total_len % 4, 0);
        assert_eq!(bytes.len(), total_len);
        assert_eq!(read_u32(&bytes, 8), 3);
        assert_eq!(read_u32(&bytes, 12), 0x1122_3344);
        assert_eq!(read_u32(&bytes, 16), 0x5566_7788);
        assert_eq!(read_u32(&bytes, 20), 7);
        assert_eq!(&bytes[28..35], &payload);
        assert_eq!(bytes[35], 0);
    }

    #[test]
    fn record_builder_sets_link_and_metadata() {
        let frame = [0xFB, 0x00, 0x01];
        let bytes = CaptureRecordBuilder::new(1, 42)
            .link(1, 2)
            .direction(Direction::Upstream)
            .frame(&frame)
            .metadata(0x1234, false, &[0x01, 0x00])
            .build()
            .unwrap();
        assert_eq!(bytes.len(), 20 + 3 + 2);

        let record = decode_capture_record(&bytes).unwrap();
        assert_eq!(record.header.timestamp_ns, 42);
        assert_eq!(record.header.lfsr, Some(0x1234));
        assert_eq!(record.header.flags.link_speed_name(), Some("2.5 GT/s"));
        assert_eq!(record.header.flags.lanes(), Some(4));
        assert_eq!(record.direction(), Direction::Upstream);
        assert_eq!(record.frame, &frame);
        assert_eq!(record.symbol_meta.len(), 1);
        assert_eq!(record.symbol_meta[0].k_symbols, 0x01);
    }

    #[test]
    fn record_builder_direction_can_be_cleared() {
        let bytes = CaptureRecordBuilder::new(1, 0)
            .direction(Direction::Upstream)
            .direction(Direction::Downstream)
            .build()
            .unwrap();
        assert_eq!(read_u32(&bytes, 16), 0);
    }

    #[test]
    fn writer_counts_interfaces() {
        let mut writer = PcapngWriter::new(Vec::new(), "tlpshark-test").unwrap();
        assert_eq!(writer.add_interface("link0").unwrap(), 0);
        assert_eq!(writer.add_interface("link1").unwrap(), 1);
        writer
            .write_record(1, &CaptureRecordBuilder::new(0, 5).frame(&[0xBC, 0x1C]))
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(read_u32(&bytes, 0), layout::BLOCK_TYPE_SECTION_HEADER);
    }
}
