use serde::{Deserialize, Serialize};

use crate::protocols::common::{BoundsError, ByteReader};
use crate::protocols::warning::Warning;

use super::error::CaptureError;
use super::layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Downstream => "downstream",
            Self::Upstream => "upstream",
        }
    }
}

/// Flags word of the record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFlags {
    pub raw: u32,
    pub gap: bool,
    pub scrambled: bool,
    pub direction: Direction,
    pub electrical_idle: u16,
    pub disparity_error: bool,
    pub channel_bonded: bool,
    pub link_speed: u8,
    pub start_lane: u8,
    pub symbol_error: bool,
    pub link_width: u8,
}

impl CaptureFlags {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            gap: raw & layout::FLAG_GAP != 0,
            scrambled: raw & layout::FLAG_SCRAMBLED != 0,
            direction: if raw & layout::FLAG_DIRECTION_UPSTREAM != 0 {
                Direction::Upstream
            } else {
                Direction::Downstream
            },
            electrical_idle: ((raw & layout::FLAG_ELECTRICAL_IDLE_MASK)
                >> layout::FLAG_ELECTRICAL_IDLE_SHIFT) as u16,
            disparity_error: raw & layout::FLAG_DISPARITY_ERROR != 0,
            channel_bonded: raw & layout::FLAG_CHANNEL_BONDED != 0,
            link_speed: ((raw & layout::FLAG_LINK_SPEED_MASK) >> layout::FLAG_LINK_SPEED_SHIFT)
                as u8,
            start_lane: ((raw & layout::FLAG_START_LANE_MASK) >> layout::FLAG_START_LANE_SHIFT)
                as u8,
            symbol_error: raw & layout::FLAG_SYMBOL_ERROR != 0,
            link_width: (raw & layout::FLAG_LINK_WIDTH_MASK) as u8,
        }
    }

    pub fn link_speed_name(&self) -> Option<&'static str> {
        match self.link_speed {
            0x1 => Some("2.5 GT/s"),
            0x3 => Some("5.0 GT/s"),
            _ => None,
        }
    }

    /// Lane count for the encoded width (x1 through x16).
    pub fn lanes(&self) -> Option<u8> {
        match self.link_width {
            0 => Some(1),
            1 => Some(2),
            2 => Some(4),
            3 => Some(8),
            4 => Some(16),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataInfo {
    pub extra_metadata: bool,
    /// Number of frame bytes; 0 means the frame runs to the end of the record.
    pub offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub record: u32,
    pub timestamp_ns: u64,
    /// LFSR and metadata info are only meaningful when either is nonzero.
    pub lfsr: Option<u16>,
    pub metadata: Option<MetadataInfo>,
    pub flags: CaptureFlags,
}

/// K-symbol and disparity bitmaps for eight consecutive bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    pub k_symbols: u8,
    pub disparity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfsrBlock {
    pub block_type: u8,
    pub link_speed: u8,
    pub idles_after: u64,
    pub electrical_idle: Option<u16>,
    pub lfsr_state: Option<u16>,
    pub data: Vec<u8>,
    pub symbol_meta: Vec<SymbolMeta>,
}

/// One analyzer record split into header, frame bytes and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord<'a> {
    pub header: RecordHeader,
    pub frame: &'a [u8],
    pub symbol_meta: Vec<SymbolMeta>,
    /// Bytes of extra metadata skipped ahead of the LFSR blocks.
    pub extra_metadata_len: usize,
    pub lfsr_blocks: Vec<LfsrBlock>,
    /// Set when the LFSR region ended mid-block or with an invalid type.
    pub lfsr_incomplete: bool,
}

impl CaptureRecord<'_> {
    pub fn direction(&self) -> Direction {
        self.header.flags.direction
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.header.timestamp_ns
    }

    /// Analyzer-reported symbol and disparity errors.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        if self.header.flags.symbol_error {
            warnings.push(Warning::SymbolError);
        }
        if self.header.flags.disparity_error {
            warnings.push(Warning::DisparityError);
        }
        warnings
    }
}

pub fn symbol_meta_len(data_len: usize) -> usize {
    layout::SYMBOL_META_PAIR_LEN * data_len.div_ceil(layout::SYMBOL_META_BYTES_PER_PAIR)
}

/// Split one analyzer record (header + data) into its parts.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::capture::{Direction, decode_capture_record};
///
/// let mut record = vec![0u8; 20];
/// record[4..12].copy_from_slice(&1_000u64.to_le_bytes());
/// record[16..20].copy_from_slice(&0x1000_0102u32.to_le_bytes());
/// record.extend_from_slice(&[0xBC, 0x1C, 0x1C, 0x1C]);
///
/// let decoded = decode_capture_record(&record).unwrap();
/// assert_eq!(decoded.direction(), Direction::Upstream);
/// assert_eq!(decoded.header.flags.link_speed_name(), Some("2.5 GT/s"));
/// assert_eq!(decoded.header.flags.lanes(), Some(4));
/// assert_eq!(decoded.frame, &[0xBC, 0x1C, 0x1C, 0x1C]);
/// ```
///
/// # Errors
/// Returns `CaptureError::TooShort` when the 20-byte header is incomplete.
/// Metadata that runs past the end of the record is dropped, not reported.
pub fn decode_capture_record(bytes: &[u8]) -> Result<CaptureRecord<'_>, CaptureError> {
    let reader = ByteReader::new(bytes);
    reader.require_len(layout::HEADER_LEN)?;

    let record = reader.read_u32_le(layout::RECORD_OFFSET)?;
    let timestamp_ns = reader.read_u64_le(layout::TIMESTAMP_OFFSET)?;
    let flags = CaptureFlags::from_raw(reader.read_u32_le(layout::FLAGS_OFFSET)?);
    let (lfsr, metadata) = if reader.read_u32_le(layout::LFSR_OFFSET)? != 0 {
        let info = reader.read_u16_le(layout::METADATA_INFO_OFFSET)?;
        (
            Some(reader.read_u16_le(layout::LFSR_OFFSET)?),
            Some(MetadataInfo {
                extra_metadata: info & layout::EXTRA_METADATA_PRESENT != 0,
                offset: info & layout::METADATA_OFFSET_MASK,
            }),
        )
    } else {
        (None, None)
    };
    let header = RecordHeader {
        record,
        timestamp_ns,
        lfsr,
        metadata,
        flags,
    };

    let body = reader.read_slice(layout::HEADER_LEN..bytes.len())?;
    let offset = metadata.map_or(0, |info| usize::from(info.offset));
    let mut decoded = CaptureRecord {
        header,
        frame: body,
        symbol_meta: Vec::new(),
        extra_metadata_len: 0,
        lfsr_blocks: Vec::new(),
        lfsr_incomplete: false,
    };
    if offset == 0 {
        return Ok(decoded);
    }

    decoded.frame = &body[..offset.min(body.len())];
    let meta_region = body.get(offset..).unwrap_or(&[]);
    let meta_len = symbol_meta_len(offset);
    if meta_len > meta_region.len() {
        return Ok(decoded);
    }
    decoded.symbol_meta = read_symbol_meta(&meta_region[..meta_len]);

    let extra_region = &meta_region[meta_len..];
    let (extra_len, skip_lfsr) = if metadata.is_some_and(|info| info.extra_metadata) {
        skip_extra_metadata(extra_region)
    } else {
        (0, false)
    };
    decoded.extra_metadata_len = extra_len;

    let lfsr_region = extra_region.get(extra_len..).unwrap_or(&[]);
    if !lfsr_region.is_empty() && !skip_lfsr {
        let (blocks, complete) = read_lfsr_blocks(lfsr_region);
        decoded.lfsr_blocks = blocks;
        decoded.lfsr_incomplete = !complete;
    }
    Ok(decoded)
}

fn read_symbol_meta(bytes: &[u8]) -> Vec<SymbolMeta> {
    bytes
        .chunks_exact(layout::SYMBOL_META_PAIR_LEN)
        .map(|pair| SymbolMeta {
            k_symbols: pair[0],
            disparity: pair[1],
        })
        .collect()
}

/// Walk the extra-metadata word chain. Returns the bytes it spans and
/// whether the LFSR blocks after it must be skipped.
fn skip_extra_metadata(region: &[u8]) -> (usize, bool) {
    let reader = ByteReader::new(region);
    let Ok(start) = reader.read_u16_be(0) else {
        return (region.len(), true);
    };
    let mut len = layout::EXTRA_WORD_LEN;
    if start & layout::EXTRA_START_CHAIN == 0 {
        return (len, true);
    }

    let mut next_len = 0;
    while len < region.len() {
        let Ok(word) = reader.read_u16_be(len) else {
            return (region.len(), true);
        };
        len += layout::EXTRA_WORD_LEN;
        let kind = word & layout::EXTRA_WORD_KIND_MASK;
        if kind == layout::EXTRA_WORD_KIND_END {
            return (len, true);
        }
        let word_len = usize::from(word >> layout::EXTRA_WORD_LEN_SHIFT);
        if kind == layout::EXTRA_WORD_KIND_LAST {
            next_len = word_len;
            break;
        }
        len += word_len;
    }
    (len, next_len == 0)
}

/// Decode LFSR blocks until the region is exhausted. The flag is false
/// when decoding stopped early on a bad type or a truncated block.
fn read_lfsr_blocks(region: &[u8]) -> (Vec<LfsrBlock>, bool) {
    let reader = ByteReader::new(region);
    let mut blocks = Vec::new();
    let mut offset = 0;
    while offset < region.len() {
        match read_lfsr_block(&reader, offset) {
            Ok(Some((block, next))) => {
                blocks.push(block);
                offset = next;
            }
            Ok(None) | Err(_) => return (blocks, false),
        }
    }
    (blocks, true)
}

fn read_lfsr_block(
    reader: &ByteReader<'_>,
    mut offset: usize,
) -> Result<Option<(LfsrBlock, usize)>, BoundsError> {
    let control = reader.read_u8(offset)?;
    let block_type = (control & layout::LFSR_CONTROL_TYPE_MASK) >> layout::LFSR_CONTROL_TYPE_SHIFT;
    if !(1..=3).contains(&block_type) {
        return Ok(None);
    }
    offset += 1;

    let idles_after = if block_type == 1 {
        let value = reader.read_u32_be(offset)?;
        offset += 4;
        u64::from(value)
    } else {
        let value = reader.read_u64_be(offset)?;
        offset += 8;
        value
    };
    let electrical_idle = if block_type == 3 {
        let value = reader.read_u16_le(offset)?;
        offset += 2;
        Some(value)
    } else {
        None
    };
    let lfsr_state = if control & layout::LFSR_CONTROL_STATE_PRESENT != 0 {
        let value = reader.read_u16_be(offset)?;
        offset += 2;
        Some(value)
    } else {
        None
    };
    let data_len = usize::from(if block_type == 1 {
        reader.read_u16_be(offset)?
    } else {
        reader.read_u16_le(offset)?
    });
    offset += 2;

    let data = reader.read_slice(offset..offset + data_len)?.to_vec();
    offset += data_len;
    let meta_len = symbol_meta_len(data_len);
    let symbol_meta = read_symbol_meta(reader.read_slice(offset..offset + meta_len)?);
    offset += meta_len;

    Ok(Some((
        LfsrBlock {
            block_type,
            link_speed: control & layout::LFSR_CONTROL_LINK_SPEED_MASK,
            idles_after,
            electrical_idle,
            lfsr_state,
            data,
            symbol_meta,
        },
        offset,
    )))
}
