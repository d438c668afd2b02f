use serde::{Deserialize, Serialize};

use crate::protocols::common::ByteReader;
use crate::protocols::crc::ecrc32;
use crate::protocols::warning::{ReservedField, Warning};

use super::error::TlpError;
use super::kind::{CompletionStatus, TlpKind, config_register_name, message_code_name};
use super::layout;

/// DW0 fields, decoded for every TLP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlpHeader {
    pub fmt: u8,
    pub type_field: u8,
    pub traffic_class: u8,
    pub tag9: bool,
    pub tag8: bool,
    /// Attr[2] (ID-based ordering) followed by Attr[1:0].
    pub attr: u8,
    pub lightweight_notification: bool,
    pub processing_hint_present: bool,
    pub digest: bool,
    pub poisoned: bool,
    pub address_type: u8,
    /// Length field as captured, before the 0 → 1024 rule.
    pub length_raw: u16,
}

impl TlpHeader {
    fn decode(reader: &ByteReader<'_>) -> Result<Self, TlpError> {
        let attr2 = reader.read_field(layout::ATTR2)? as u8;
        let attr10 = reader.read_field(layout::ATTR)? as u8;
        Ok(Self {
            fmt: reader.read_field(layout::FMT)? as u8,
            type_field: reader.read_field(layout::TYPE)? as u8,
            traffic_class: reader.read_field(layout::TC)? as u8,
            tag9: reader.read_flag(layout::TAG9)?,
            tag8: reader.read_flag(layout::TAG8)?,
            attr: (attr2 << 2) | attr10,
            lightweight_notification: reader.read_flag(layout::LN)?,
            processing_hint_present: reader.read_flag(layout::TH)?,
            digest: reader.read_flag(layout::TD)?,
            poisoned: reader.read_flag(layout::EP)?,
            address_type: reader.read_field(layout::AT)? as u8,
            length_raw: reader.read_field(layout::LENGTH)? as u16,
        })
    }

    pub fn is_4dw(&self) -> bool {
        self.fmt & layout::FMT_4DW != 0
    }

    pub fn has_data(&self) -> bool {
        self.fmt & layout::FMT_WITH_DATA != 0
    }

    pub fn header_dw(&self) -> usize {
        if self.is_4dw() {
            layout::HEADER_DW_4
        } else {
            layout::HEADER_DW_3
        }
    }

    /// Length in DW with 0 meaning the 1024 DW maximum.
    pub fn length_dw(&self) -> u32 {
        match self.length_raw {
            0 => layout::MAX_PAYLOAD_DW,
            n => u32::from(n),
        }
    }

    /// Upper two tag bits positioned for OR-ing with Tag[7:0].
    pub fn tag_high(&self) -> u16 {
        (u16::from(self.tag9) << 9) | (u16::from(self.tag8) << 8)
    }
}

/// Requester ID, Tag[7:0] and byte enables shared by all request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub requester_id: u16,
    pub tag: u8,
    pub last_be: u8,
    pub first_be: u8,
}

impl RequestHeader {
    fn decode(reader: &ByteReader<'_>) -> Result<Self, TlpError> {
        Ok(Self {
            requester_id: reader.read_u16_be(layout::REQUESTER_ID_OFFSET)?,
            tag: reader.read_u8(layout::TAG_OFFSET)?,
            last_be: reader.read_field(layout::LAST_BE)? as u8,
            first_be: reader.read_field(layout::FIRST_BE)? as u8,
        })
    }
}

/// Format-dependent part of a TLP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "body", rename_all = "snake_case")]
pub enum TlpBody {
    MemoryRequest {
        request: RequestHeader,
        address: u64,
        processing_hint: u8,
    },
    IoRequest {
        request: RequestHeader,
        address: u32,
    },
    ConfigRequest {
        request: RequestHeader,
        completer_id: u16,
        /// DWORD index of the register.
        register: u16,
    },
    MessageRequest {
        request: RequestHeader,
        message_code: u8,
        routing: u8,
    },
    Completion {
        completer_id: u16,
        status: CompletionStatus,
        byte_count_modified: bool,
        /// Remaining byte count, 0 on the wire meaning 4096.
        byte_count: u16,
        requester_id: u16,
        tag: u8,
        lower_address: u8,
    },
    /// TLP prefix; only the prefix kind is known.
    Prefix,
    /// Fmt/Type the decoder names but does not interpret.
    Unrecognized,
}

impl TlpBody {
    pub fn request(&self) -> Option<&RequestHeader> {
        match self {
            Self::MemoryRequest { request, .. }
            | Self::IoRequest { request, .. }
            | Self::ConfigRequest { request, .. }
            | Self::MessageRequest { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Prefix | Self::Unrecognized)
    }
}

/// Captured and recomputed end-to-end CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcrcCheck {
    pub value: u32,
    pub expected: u32,
}

impl EcrcCheck {
    pub fn valid(&self) -> bool {
        self.value == self.expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlp {
    pub dw0: u32,
    pub kind: TlpKind,
    /// `None` for TLP prefixes.
    pub header: Option<TlpHeader>,
    pub body: TlpBody,
    /// Decoded Length in DW; zero for types whose Length is reserved.
    pub length_dw: u32,
    /// Data DWORDs in host order (little-endian on the wire).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u32>,
    pub ecrc: Option<EcrcCheck>,
    /// Full 10-bit tag.
    pub tag: Option<u16>,
    /// `(tag << 16) | requester_id`, identical on a request and its completions.
    pub transaction_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl Tlp {
    pub fn name(&self) -> String {
        self.kind.short_name()
    }

    /// Kind name plus the message code or the config register, e.g.
    /// `CfgRd0 @ 0x034 (Capabilities)`.
    pub fn summary(&self) -> String {
        let name = self.name();
        match self.body {
            TlpBody::MessageRequest { message_code, .. } => match message_code_name(message_code) {
                Some(code) => format!("{name} {code}"),
                None => format!("{name} code 0x{message_code:02x}"),
            },
            TlpBody::ConfigRequest { register, .. } => {
                let offset = u32::from(register) * 4;
                match config_register_name(register) {
                    Some(reg) => format!("{name} @ 0x{offset:03x} ({reg})"),
                    None => format!("{name} @ 0x{offset:03x}"),
                }
            }
            _ => name,
        }
    }

    pub fn ecrc_valid(&self) -> Option<bool> {
        self.ecrc.map(|check| check.valid())
    }

    pub fn reserved_bits_zero(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::ReservedNonZero { .. }))
    }

    pub fn completion_status(&self) -> Option<CompletionStatus> {
        match self.body {
            TlpBody::Completion { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Bytes a TLP occupies given its DW0: header, data and ECRC DWs.
///
/// Used by the framer to size the TLP before decoding it.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::tlp::wire_len;
///
/// assert_eq!(wire_len(0x2000_0004), 16); // MRd 4DW, no data on the wire
/// assert_eq!(wire_len(0x4000_0001), 16); // MWr 3DW, 1 DW of data
/// assert_eq!(wire_len(0x4000_8000), 4 * (3 + 1024 + 1));
/// ```
pub fn wire_len(dw0: u32) -> usize {
    let fmt = (dw0 >> 29) as u8;
    let mut dws = if fmt & layout::FMT_4DW != 0 {
        layout::HEADER_DW_4
    } else {
        layout::HEADER_DW_3
    };
    if fmt & layout::FMT_WITH_DATA != 0 {
        dws += match dw0 & 0x3FF {
            0 => layout::MAX_PAYLOAD_DW as usize,
            n => n as usize,
        };
    }
    if dw0 & (1 << 15) != 0 {
        dws += 1;
    }
    dws * layout::DW_LEN
}

/// Decode one TLP from its bytes (no framing, sequence number or LCRC).
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::tlp::{TlpBody, TlpKind, decode_tlp};
///
/// let bytes = [
///     0x20, 0x00, 0x00, 0x04, // MRd, 4DW header, 4 DW
///     0x01, 0x00, 0x05, 0xFF, // requester 01:00.0, tag 5, BE 0xF/0xF
///     0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
/// ];
/// let tlp = decode_tlp(&bytes).unwrap();
/// assert_eq!(tlp.kind, TlpKind::MemRead { addr64: true });
/// assert!(matches!(tlp.body, TlpBody::MemoryRequest { address: 0x1_0000_0000, .. }));
/// assert_eq!(tlp.tag, Some(5));
/// assert_eq!(tlp.length_dw, 4);
/// ```
///
/// # Errors
/// Returns `TlpError::TooShort` when the bytes end before the header,
/// payload or ECRC the TLP announces.
pub fn decode_tlp(bytes: &[u8]) -> Result<Tlp, TlpError> {
    let reader = ByteReader::new(bytes);
    let dw0 = reader.read_u32_be(layout::FMT_TYPE_OFFSET)?;
    let fmt_type = reader.read_u8(layout::FMT_TYPE_OFFSET)?;
    let kind = TlpKind::from_fmt_type(fmt_type);

    if let TlpKind::Prefix { .. } = kind {
        return Ok(Tlp {
            dw0,
            kind,
            header: None,
            body: TlpBody::Prefix,
            length_dw: 0,
            payload: Vec::new(),
            ecrc: None,
            tag: None,
            transaction_id: None,
            warnings: Vec::new(),
        });
    }

    let header = TlpHeader::decode(&reader)?;
    let mut warnings = Vec::new();

    let length_dw = if kind.has_reserved_length() {
        if header.length_raw != 0 {
            warnings.push(Warning::ReservedNonZero {
                field: ReservedField::TlpLength,
                value: u32::from(header.length_raw),
            });
        }
        0
    } else {
        header.length_dw()
    };

    reader.require_len(header.header_dw() * layout::DW_LEN)?;
    let body = decode_body(&reader, fmt_type, &header)?;

    let (tag, transaction_id) = match &body {
        TlpBody::Completion {
            requester_id, tag, ..
        } => {
            let tag = header.tag_high() | u16::from(*tag);
            (Some(tag), Some(transaction_id(tag, *requester_id)))
        }
        other => match other.request() {
            Some(request) => {
                let tag = header.tag_high() | u16::from(request.tag);
                (Some(tag), Some(transaction_id(tag, request.requester_id)))
            }
            None => (None, None),
        },
    };

    if let TlpBody::Completion { status, .. } = &body {
        if !status.is_successful() {
            warnings.push(Warning::CompletionStatus {
                status: status.bits(),
            });
        }
    }

    let mut payload = Vec::new();
    let mut ecrc = None;
    if body.is_recognized() {
        let header_dw = header.header_dw();
        let data_dw = if header.has_data() {
            length_dw as usize
        } else {
            0
        };
        let data_start = header_dw * layout::DW_LEN;
        reader.require_len(data_start + data_dw * layout::DW_LEN)?;
        payload = (0..data_dw)
            .map(|i| reader.read_u32_le(data_start + i * layout::DW_LEN))
            .collect::<Result<Vec<u32>, _>>()?;

        if header.digest {
            let ecrc_dw = header_dw + data_dw;
            let value = reader.read_u32_le(ecrc_dw * layout::DW_LEN)?;
            let expected = ecrc32(bytes, ecrc_dw);
            if value != expected {
                warnings.push(Warning::EcrcInvalid {
                    expected,
                    actual: value,
                });
            }
            ecrc = Some(EcrcCheck { value, expected });
        }
    }

    Ok(Tlp {
        dw0,
        kind,
        header: Some(header),
        body,
        length_dw,
        payload,
        ecrc,
        tag,
        transaction_id,
        warnings,
    })
}

pub fn transaction_id(tag: u16, requester_id: u16) -> u32 {
    (u32::from(tag) << 16) | u32::from(requester_id)
}

fn decode_body(
    reader: &ByteReader<'_>,
    fmt_type: u8,
    header: &TlpHeader,
) -> Result<TlpBody, TlpError> {
    let body = match fmt_type {
        0x00 | 0x20 | 0x40 | 0x60 => {
            let request = RequestHeader::decode(reader)?;
            let raw = if header.is_4dw() {
                reader.read_u64_be(layout::ADDRESS_OFFSET)?
            } else {
                u64::from(reader.read_u32_be(layout::ADDRESS_OFFSET)?)
            };
            TlpBody::MemoryRequest {
                request,
                address: raw & layout::ADDRESS_MASK,
                processing_hint: (raw & layout::PROCESSING_HINT_MASK) as u8,
            }
        }
        0x02 | 0x42 => TlpBody::IoRequest {
            request: RequestHeader::decode(reader)?,
            address: reader.read_u32_be(layout::ADDRESS_OFFSET)?,
        },
        0x04 | 0x44 | 0x05 | 0x45 => {
            let request = RequestHeader::decode(reader)?;
            let completer_id = reader.read_u16_be(layout::CFG_COMPLETER_ID_OFFSET)?;
            let register = (reader.read_u16_be(layout::CFG_REGISTER_OFFSET)?
                & layout::CFG_REGISTER_MASK)
                >> layout::CFG_REGISTER_SHIFT;
            TlpBody::ConfigRequest {
                request,
                completer_id,
                register,
            }
        }
        ft if ft & 0xB8 == 0x30 => TlpBody::MessageRequest {
            request: RequestHeader::decode(reader)?,
            message_code: reader.read_u8(layout::MESSAGE_CODE_OFFSET)?,
            routing: header.type_field & 0x07,
        },
        0x0A | 0x4A => {
            let byte_count = match reader.read_field(layout::CPL_BYTE_COUNT)? as u16 {
                0 => layout::MAX_BYTE_COUNT,
                n => n,
            };
            TlpBody::Completion {
                completer_id: reader.read_u16_be(layout::CPL_COMPLETER_ID_OFFSET)?,
                status: CompletionStatus::from_bits(
                    reader.read_field(layout::CPL_STATUS)? as u8
                ),
                byte_count_modified: reader.read_flag(layout::CPL_BCM)?,
                byte_count,
                requester_id: reader.read_u16_be(layout::CPL_REQUESTER_ID_OFFSET)?,
                tag: reader.read_u8(layout::CPL_TAG_OFFSET)?,
                lower_address: reader.read_field(layout::CPL_LOWER_ADDRESS)? as u8,
            }
        }
        _ => TlpBody::Unrecognized,
    };
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::crc::ecrc32;

    fn mrd_4dw() -> Vec<u8> {
        vec![
            0x20, 0x00, 0x00, 0x04, 0x01, 0x00, 0x05, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            0x00, 0x00,
        ]
    }

    #[test]
    fn memory_read_4dw() {
        let tlp = decode_tlp(&mrd_4dw()).unwrap();
        assert_eq!(tlp.kind, TlpKind::MemRead { addr64: true });
        assert_eq!(
            tlp.body,
            TlpBody::MemoryRequest {
                request: RequestHeader {
                    requester_id: 0x0100,
                    tag: 5,
                    last_be: 0xF,
                    first_be: 0xF,
                },
                address: 0x0000_0001_0000_0000,
                processing_hint: 0,
            }
        );
        assert_eq!(tlp.length_dw, 4);
        assert_eq!(tlp.tag, Some(5));
        assert_eq!(tlp.transaction_id, Some(0x0005_0100));
        assert!(tlp.payload.is_empty());
        assert!(tlp.ecrc.is_none());
        assert!(tlp.warnings.is_empty());
    }

    #[test]
    fn memory_write_32bit_address_and_hint() {
        let bytes = [
            0x40, 0x00, 0x00, 0x02, 0x00, 0x08, 0x01, 0x0F, 0xFE, 0xDC, 0x10, 0x03, 0x11, 0x22,
            0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(tlp.kind, TlpKind::MemWrite { addr64: false });
        match tlp.body {
            TlpBody::MemoryRequest {
                address,
                processing_hint,
                request,
            } => {
                assert_eq!(address, 0xFEDC_1000);
                assert_eq!(processing_hint, 3);
                assert_eq!(request.last_be, 0);
                assert_eq!(request.first_be, 0xF);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(tlp.payload, vec![0x4433_2211, 0x8877_6655]);
    }

    #[test]
    fn extended_tag_bits_join_the_low_tag() {
        let mut bytes = mrd_4dw();
        bytes[1] = 0x80 | 0x08; // T9 and T8
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(tlp.tag, Some(0x305));
        assert_eq!(tlp.transaction_id, Some(0x0305_0100));
    }

    #[test]
    fn completion_byte_count_zero_means_4096() {
        let bytes = [
            0x4A, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x05, 0x84, 0xAA, 0xBB,
            0xCC, 0xDD,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(
            tlp.body,
            TlpBody::Completion {
                completer_id: 0x0100,
                status: CompletionStatus::SuccessfulCompletion,
                byte_count_modified: false,
                byte_count: 4096,
                requester_id: 0x0200,
                tag: 5,
                lower_address: 0x04,
            }
        );
        assert_eq!(tlp.transaction_id, Some(0x0005_0200));
        assert_eq!(tlp.payload, vec![0xDDCC_BBAA]);
    }

    #[test]
    fn unsuccessful_completion_is_flagged() {
        // Cpl, status UR, byte count 4.
        let bytes = [
            0x0A, 0x00, 0x00, 0x00, 0x01, 0x00, 0x20, 0x04, 0x02, 0x00, 0x07, 0x00,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(
            tlp.completion_status(),
            Some(CompletionStatus::UnsupportedRequest)
        );
        assert_eq!(tlp.warnings, vec![Warning::CompletionStatus { status: 1 }]);
        assert_eq!(tlp.length_dw, 0);
    }

    #[test]
    fn reserved_length_on_message_is_flagged() {
        // Msg Assert_INTA, local routing, Length = 1.
        let bytes = [
            0x34, 0x00, 0x00, 0x01, 0x00, 0x10, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(
            tlp.body,
            TlpBody::MessageRequest {
                request: RequestHeader {
                    requester_id: 0x0010,
                    tag: 0,
                    last_be: 2,
                    first_be: 0,
                },
                message_code: 0x20,
                routing: 4,
            }
        );
        assert_eq!(tlp.length_dw, 0);
        assert!(!tlp.reserved_bits_zero());
        assert_eq!(
            tlp.summary(),
            "Msg (Local - Terminate at Receiver) Assert_INTA"
        );
    }

    #[test]
    fn unnamed_message_code_is_shown_in_hex() {
        let bytes = [
            0x30, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x99, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(tlp.summary(), "Msg (Routed to Root Complex) code 0x99");
        assert_eq!(tlp.name(), "Msg (Routed to Root Complex)");
    }

    #[test]
    fn config_register_number() {
        // CfgRd0 to 02:00.0, register 0x0D (byte offset 0x34).
        let bytes = [
            0x04, 0x00, 0x00, 0x01, 0x00, 0x00, 0x09, 0x0F, 0x02, 0x00, 0x00, 0x34,
        ];
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(tlp.kind, TlpKind::CfgRead { cfg_type: 0 });
        match tlp.body {
            TlpBody::ConfigRequest {
                completer_id,
                register,
                ..
            } => {
                assert_eq!(completer_id, 0x0200);
                assert_eq!(register, 0x0D);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(tlp.summary(), "CfgRd0 @ 0x034 (Capabilities)");

        // Register 0x11 (offset 0x044) has no label.
        let mut unlabelled = bytes;
        unlabelled[11] = 0x44;
        let tlp = decode_tlp(&unlabelled).unwrap();
        assert_eq!(tlp.summary(), "CfgRd0 @ 0x044");
    }

    #[test]
    fn ecrc_is_verified() {
        let mut bytes = vec![
            0x40, 0x00, 0x80, 0x01, 0x00, 0x08, 0x02, 0x0F, 0x00, 0x00, 0x10, 0x00, 0x01, 0x02,
            0x03, 0x04,
        ];
        let ecrc = ecrc32(&bytes, 4);
        bytes.extend_from_slice(&ecrc.to_le_bytes());
        let tlp = decode_tlp(&bytes).unwrap();
        assert_eq!(tlp.ecrc_valid(), Some(true));
        assert!(tlp.warnings.is_empty());

        bytes[14] ^= 0x40;
        let tampered = decode_tlp(&bytes).unwrap();
        assert_eq!(tampered.ecrc_valid(), Some(false));
        assert!(matches!(
            tampered.warnings.as_slice(),
            [Warning::EcrcInvalid { .. }]
        ));
    }

    #[test]
    fn atomic_and_prefix_are_named_only() {
        let prefix = decode_tlp(&[0x90, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(prefix.body, TlpBody::Prefix);
        assert!(prefix.header.is_none());

        let swap = decode_tlp(&[
            0x4D, 0x00, 0x80, 0x01, 0x00, 0x08, 0x03, 0x0F, 0x00, 0x00, 0x20, 0x00,
        ])
        .unwrap();
        assert_eq!(swap.name(), "Swap-32");
        assert_eq!(swap.body, TlpBody::Unrecognized);
        assert!(swap.payload.is_empty());
        assert!(swap.ecrc.is_none());
        assert!(swap.transaction_id.is_none());
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut bytes = mrd_4dw();
        bytes[0] = 0x60; // MWr 4DW now claims 4 DW of data
        let err = decode_tlp(&bytes).unwrap_err();
        assert_eq!(
            err,
            TlpError::TooShort {
                needed: 32,
                actual: 16
            }
        );
    }
}
