use serde::{Deserialize, Serialize};

use crate::protocols::common::ByteReader;
use crate::protocols::crc::lcrc32;
use crate::protocols::dllp::layout::DLLP_LEN;
use crate::protocols::dllp::{Dllp, decode_dllp};
use crate::protocols::symbols::{K29_7, KSymbol};
use crate::protocols::tlp::{Tlp, decode_tlp, wire_len};
use crate::protocols::warning::{ReservedField, Warning};

use super::error::FrameError;
use super::layout;
use super::ordered_set::{OrderedSet, decode_ordered_set};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlpFrame {
    pub sequence: u16,
    pub sequence_reserved: u8,
    pub tlp: Tlp,
    /// LCRC as captured.
    pub lcrc: u32,
    pub lcrc_expected: u32,
    pub end_tag: u8,
    /// Terminated with EDB.
    pub nullified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl TlpFrame {
    pub fn lcrc_valid(&self) -> bool {
        self.lcrc == self.lcrc_expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DllpFrame {
    pub dllp: Dllp,
    pub end_tag: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

/// One decoded capture unit, classified by its start symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Tlp(TlpFrame),
    Dllp(DllpFrame),
    OrderedSet(OrderedSet),
    Unknown { start_tag: u8 },
}

/// Per-unit integrity results. `None` means the check does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrityChecks {
    pub dllp_crc_valid: Option<bool>,
    pub lcrc_valid: Option<bool>,
    pub ecrc_valid: Option<bool>,
    pub end_tag_valid: Option<bool>,
    pub reserved_bits_zero: bool,
}

impl IntegrityChecks {
    pub fn all_valid(&self) -> bool {
        [
            self.dllp_crc_valid,
            self.lcrc_valid,
            self.ecrc_valid,
            self.end_tag_valid,
        ]
        .into_iter()
        .all(|check| check != Some(false))
            && self.reserved_bits_zero
    }
}

impl Frame {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Tlp(_) => "tlp",
            Self::Dllp(_) => "dllp",
            Self::OrderedSet(_) => "ordered_set",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Short human-readable summary, e.g. `TLP MRd`, `TLP CfgRd0 @ 0x010`
    /// or `DLLP Ack`.
    pub fn summary(&self) -> String {
        match self {
            Self::Tlp(frame) => format!("TLP {}", frame.tlp.summary()),
            Self::Dllp(frame) => format!("DLLP {}", frame.dllp.kind.name()),
            Self::OrderedSet(set) => set.name().to_string(),
            Self::Unknown { start_tag } => format!("Unknown start tag 0x{start_tag:02X}"),
        }
    }

    pub fn tlp(&self) -> Option<&Tlp> {
        match self {
            Self::Tlp(frame) => Some(&frame.tlp),
            _ => None,
        }
    }

    /// Frame warnings followed by those of the nested packet.
    pub fn warnings(&self) -> Vec<Warning> {
        match self {
            Self::Tlp(frame) => frame
                .warnings
                .iter()
                .chain(&frame.tlp.warnings)
                .cloned()
                .collect(),
            Self::Dllp(frame) => frame
                .warnings
                .iter()
                .chain(&frame.dllp.warnings)
                .cloned()
                .collect(),
            Self::OrderedSet(_) | Self::Unknown { .. } => Vec::new(),
        }
    }

    pub fn integrity(&self) -> IntegrityChecks {
        match self {
            Self::Tlp(frame) => IntegrityChecks {
                dllp_crc_valid: None,
                lcrc_valid: Some(frame.lcrc_valid()),
                ecrc_valid: frame.tlp.ecrc_valid(),
                end_tag_valid: Some(!frame.warnings.iter().any(is_end_tag_warning)),
                reserved_bits_zero: frame.tlp.reserved_bits_zero()
                    && frame.sequence_reserved == 0,
            },
            Self::Dllp(frame) => IntegrityChecks {
                dllp_crc_valid: Some(frame.dllp.crc_valid()),
                lcrc_valid: None,
                ecrc_valid: None,
                end_tag_valid: Some(!frame.warnings.iter().any(is_end_tag_warning)),
                reserved_bits_zero: frame.dllp.reserved_bits_zero(),
            },
            Self::OrderedSet(_) | Self::Unknown { .. } => IntegrityChecks {
                reserved_bits_zero: true,
                ..IntegrityChecks::default()
            },
        }
    }
}

fn is_end_tag_warning(warning: &Warning) -> bool {
    matches!(warning, Warning::EndTagInvalid { .. })
}

/// Decode one capture unit's frame bytes.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::frame::{Frame, decode_frame};
///
/// // SDP, Ack seq 7 with its CRC, END.
/// let frame = decode_frame(&[0x5C, 0x00, 0x00, 0x00, 0x07, 0xD4, 0x20, 0xFD]).unwrap();
/// assert_eq!(frame.summary(), "DLLP Ack");
/// assert!(frame.integrity().all_valid());
///
/// assert_eq!(decode_frame(&[0x00]).unwrap(), Frame::Unknown { start_tag: 0x00 });
/// ```
///
/// # Errors
/// Returns `FrameError::TooShort` when the bytes end before the frame the
/// start symbol (and, for TLPs, the header) announces. Nothing nested is
/// decoded in that case.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let reader = ByteReader::new(bytes);
    let start_tag = reader.read_u8(layout::START_TAG_OFFSET)?;

    match KSymbol::from_byte(start_tag) {
        Some(KSymbol::Stp) => decode_tlp_frame(&reader).map(Frame::Tlp),
        Some(KSymbol::Sdp) => decode_dllp_frame(&reader).map(Frame::Dllp),
        Some(KSymbol::Com) => Ok(Frame::OrderedSet(decode_ordered_set(&reader)?)),
        _ => Ok(Frame::Unknown { start_tag }),
    }
}

fn decode_tlp_frame(reader: &ByteReader<'_>) -> Result<TlpFrame, FrameError> {
    let dw0 = reader.read_u32_be(layout::TLP_OFFSET)?;
    let tlp_len = wire_len(dw0);
    let lcrc_offset = layout::TLP_OFFSET + tlp_len;
    let end_offset = lcrc_offset + layout::LCRC_LEN;
    reader.require_len(end_offset + layout::END_TAG_LEN)?;

    let sequence_reserved = reader.read_field(layout::STP_SEQUENCE_RESERVED)? as u8;
    let sequence = reader.read_field(layout::STP_SEQUENCE)? as u16;
    let tlp = decode_tlp(reader.read_slice(layout::TLP_OFFSET..lcrc_offset)?)?;
    let lcrc = reader.read_u32_le(lcrc_offset)?;
    let lcrc_expected = lcrc32(reader.read_slice(layout::LCRC_COVERAGE_START..lcrc_offset)?);
    let end_tag = reader.read_u8(end_offset)?;

    let mut warnings = Vec::new();
    if sequence_reserved != 0 {
        warnings.push(Warning::ReservedNonZero {
            field: ReservedField::TlpSequence,
            value: u32::from(sequence_reserved),
        });
    }
    if lcrc != lcrc_expected {
        warnings.push(Warning::LcrcInvalid {
            expected: lcrc_expected,
            actual: lcrc,
        });
    }
    let end_symbol = KSymbol::from_byte(end_tag);
    if !end_symbol.is_some_and(KSymbol::is_end) {
        warnings.push(Warning::EndTagInvalid { value: end_tag });
    }

    Ok(TlpFrame {
        sequence,
        sequence_reserved,
        tlp,
        lcrc,
        lcrc_expected,
        end_tag,
        nullified: end_symbol == Some(KSymbol::Edb),
        warnings,
    })
}

fn decode_dllp_frame(reader: &ByteReader<'_>) -> Result<DllpFrame, FrameError> {
    reader.require_len(layout::DLLP_END_TAG_OFFSET + layout::END_TAG_LEN)?;
    let body = reader.read_slice(layout::DLLP_OFFSET..layout::DLLP_OFFSET + DLLP_LEN)?;
    let dllp = decode_dllp(body)?;
    let end_tag = reader.read_u8(layout::DLLP_END_TAG_OFFSET)?;

    let mut warnings = Vec::new();
    if end_tag != K29_7 {
        warnings.push(Warning::EndTagInvalid { value: end_tag });
    }
    Ok(DllpFrame {
        dllp,
        end_tag,
        warnings,
    })
}
