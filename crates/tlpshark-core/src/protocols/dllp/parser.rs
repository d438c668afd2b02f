use serde::{Deserialize, Serialize};

use crate::protocols::common::ByteReader;
use crate::protocols::crc::dllp_crc16;
use crate::protocols::warning::{ReservedField, Warning};

use super::error::DllpError;
use super::layout;

/// Flow-control DLLP family, from type bits 7:6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FcKind {
    InitFc1,
    InitFc2,
    UpdateFc,
}

impl FcKind {
    fn from_type(type_byte: u8) -> Option<Self> {
        match (type_byte & layout::FC_KIND_MASK) >> 6 {
            0b01 => Some(Self::InitFc1),
            0b11 => Some(Self::InitFc2),
            0b10 => Some(Self::UpdateFc),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InitFc1 => "InitFC1",
            Self::InitFc2 => "InitFC2",
            Self::UpdateFc => "UpdateFC",
        }
    }
}

/// Credit class advertised by a flow-control DLLP, from type bits 5:4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditClass {
    Posted,
    NonPosted,
    Completion,
}

impl CreditClass {
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Posted => "P",
            Self::NonPosted => "NP",
            Self::Completion => "Cpl",
        }
    }
}

/// DLLP type, decoded once from the type byte.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::dllp::{CreditClass, DllpKind, FcKind};
///
/// assert_eq!(DllpKind::from_type(0x10), DllpKind::Nak);
/// assert_eq!(
///     DllpKind::from_type(0x52),
///     DllpKind::FlowControl { kind: FcKind::InitFc1, class: CreditClass::NonPosted, vc: 2 }
/// );
/// assert_eq!(DllpKind::from_type(0x52).name(), "InitFC1-NP (VC2)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DllpKind {
    Ack,
    Nak,
    MrInit,
    DataLinkFeature,
    PmEnterL1,
    PmEnterL23,
    PmActiveStateRequestL1,
    PmRequestAck,
    VendorSpecific,
    Nop,
    FlowControl {
        kind: FcKind,
        class: CreditClass,
        vc: u8,
    },
    MrFlowControl {
        kind: FcKind,
        vl: u8,
    },
    Unknown {
        type_byte: u8,
    },
}

impl DllpKind {
    pub fn from_type(type_byte: u8) -> Self {
        match type_byte {
            layout::TYPE_ACK => return Self::Ack,
            layout::TYPE_MR_INIT => return Self::MrInit,
            layout::TYPE_DATA_LINK_FEATURE => return Self::DataLinkFeature,
            layout::TYPE_NAK => return Self::Nak,
            layout::TYPE_PM_ENTER_L1 => return Self::PmEnterL1,
            layout::TYPE_PM_ENTER_L23 => return Self::PmEnterL23,
            layout::TYPE_PM_ACTIVE_STATE_REQUEST_L1 => return Self::PmActiveStateRequestL1,
            layout::TYPE_PM_REQUEST_ACK => return Self::PmRequestAck,
            layout::TYPE_VENDOR_SPECIFIC => return Self::VendorSpecific,
            layout::TYPE_NOP => return Self::Nop,
            _ => {}
        }

        if type_byte & layout::FC_RESERVED_BIT == 0 {
            if let Some(kind) = FcKind::from_type(type_byte) {
                let low = type_byte & layout::FC_VC_MASK;
                return match type_byte & layout::FC_CLASS_MASK {
                    layout::FC_CLASS_POSTED => Self::FlowControl {
                        kind,
                        class: CreditClass::Posted,
                        vc: low,
                    },
                    layout::FC_CLASS_NON_POSTED => Self::FlowControl {
                        kind,
                        class: CreditClass::NonPosted,
                        vc: low,
                    },
                    layout::FC_CLASS_COMPLETION => Self::FlowControl {
                        kind,
                        class: CreditClass::Completion,
                        vc: low,
                    },
                    // 0x30: multi-root credit classes.
                    _ => Self::MrFlowControl { kind, vl: low },
                };
            }
        }
        Self::Unknown { type_byte }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Ack => "Ack".to_string(),
            Self::Nak => "Nak".to_string(),
            Self::MrInit => "MRInit".to_string(),
            Self::DataLinkFeature => "Data_Link_Feature".to_string(),
            Self::PmEnterL1 => "PM_Enter_L1".to_string(),
            Self::PmEnterL23 => "PM_Enter_L23".to_string(),
            Self::PmActiveStateRequestL1 => "PM_Active_State_Request_L1".to_string(),
            Self::PmRequestAck => "PM_Request_Ack".to_string(),
            Self::VendorSpecific => "Vendor-specific".to_string(),
            Self::Nop => "NOP".to_string(),
            Self::FlowControl { kind, class, vc } => {
                format!("{}-{} (VC{vc})", kind.name(), class.short_name())
            }
            Self::MrFlowControl { kind, vl } => {
                let name = match kind {
                    FcKind::InitFc1 => "MRInitFC1",
                    FcKind::InitFc2 => "MRInitFC2",
                    FcKind::UpdateFc => "MRUpdateFC",
                };
                format!("{name} (VL{vl})")
            }
            Self::Unknown { type_byte } => format!("Unknown DLLP type (0x{type_byte:02X})"),
        }
    }
}

/// Header/data credits of an InitFC1/InitFC2/UpdateFC DLLP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowControlCredits {
    pub hdr_scale: u8,
    pub hdr_fc: u8,
    pub data_scale: u8,
    pub data_fc: u16,
    /// `hdr_fc` with the scale factor applied.
    pub hdr_credits: u32,
    /// `data_fc` with the scale factor applied.
    pub data_credits: u32,
}

/// Scaled flow-control multiplier: 2 → 4, 3 → 16, anything else → 1.
pub fn scale_multiplier(scale: u8) -> u32 {
    match scale {
        2 => 4,
        3 => 16,
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DllpPayload {
    AckNak {
        sequence: u16,
        reserved: u16,
    },
    Feature {
        ack: bool,
        /// Feature-support bits 22:0.
        feature_support: u32,
        local_scaled_flow_control: bool,
    },
    PowerManagement {
        reserved: u32,
    },
    FlowControl {
        credits: FlowControlCredits,
    },
    /// Content of a type the decoder does not interpret.
    Unparsed {
        content: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dllp {
    pub type_byte: u8,
    pub kind: DllpKind,
    pub payload: DllpPayload,
    /// CRC-16 as captured.
    pub crc: u16,
    /// CRC-16 computed over the first four bytes.
    pub crc_expected: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl Dllp {
    pub fn crc_valid(&self) -> bool {
        self.crc == self.crc_expected
    }

    pub fn reserved_bits_zero(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::ReservedNonZero { .. }))
    }
}

/// Decode one DLLP from its six wire bytes.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::dllp::{DllpKind, DllpPayload, decode_dllp};
///
/// let dllp = decode_dllp(&[0x00, 0x00, 0x00, 0x07, 0xD4, 0x20]).unwrap();
/// assert_eq!(dllp.kind, DllpKind::Ack);
/// assert_eq!(dllp.payload, DllpPayload::AckNak { sequence: 7, reserved: 0 });
/// assert!(dllp.crc_valid());
/// ```
///
/// # Errors
/// Returns `DllpError::TooShort` when fewer than six bytes are available.
pub fn decode_dllp(bytes: &[u8]) -> Result<Dllp, DllpError> {
    let reader = ByteReader::new(bytes);
    reader.require_len(layout::DLLP_LEN)?;

    let type_byte = reader.read_u8(layout::TYPE_OFFSET)?;
    let kind = DllpKind::from_type(type_byte);
    let mut warnings = Vec::new();

    let payload = match kind {
        DllpKind::Ack | DllpKind::Nak => {
            let reserved = reader.read_field(layout::ACK_NAK_RESERVED)? as u16;
            let sequence = reader.read_field(layout::ACK_NAK_SEQUENCE)? as u16;
            if reserved != 0 {
                warnings.push(Warning::ReservedNonZero {
                    field: ReservedField::AckNak,
                    value: u32::from(reserved),
                });
            }
            DllpPayload::AckNak { sequence, reserved }
        }
        DllpKind::DataLinkFeature => DllpPayload::Feature {
            ack: reader.read_flag(layout::FEATURE_ACK)?,
            feature_support: reader.read_field(layout::FEATURE_SUPPORT)? as u32,
            local_scaled_flow_control: reader.read_flag(layout::FEATURE_LOCAL_SCALED_FC)?,
        },
        DllpKind::FlowControl { .. } => {
            let hdr_scale = reader.read_field(layout::FC_HDR_SCALE)? as u8;
            let hdr_fc = reader.read_field(layout::FC_HDR_FC)? as u8;
            let data_scale = reader.read_field(layout::FC_DATA_SCALE)? as u8;
            let data_fc = reader.read_field(layout::FC_DATA_FC)? as u16;
            DllpPayload::FlowControl {
                credits: FlowControlCredits {
                    hdr_scale,
                    hdr_fc,
                    data_scale,
                    data_fc,
                    hdr_credits: u32::from(hdr_fc) * scale_multiplier(hdr_scale),
                    data_credits: u32::from(data_fc) * scale_multiplier(data_scale),
                },
            }
        }
        _ if type_byte & layout::PM_TYPE_MASK == layout::PM_TYPE_PATTERN => {
            let reserved = reader.read_field(layout::PM_RESERVED)? as u32;
            if reserved != 0 {
                warnings.push(Warning::ReservedNonZero {
                    field: ReservedField::PowerManagement,
                    value: reserved,
                });
            }
            DllpPayload::PowerManagement { reserved }
        }
        _ => DllpPayload::Unparsed {
            content: reader.read_u24_be(layout::CONTENT_OFFSET)?,
        },
    };

    let crc = reader.read_u16_le(layout::CRC_OFFSET)?;
    let crc_expected = dllp_crc16(reader.read_slice(0..layout::CRC_COVERAGE_LEN)?);
    if crc != crc_expected {
        warnings.push(Warning::DllpCrcInvalid {
            expected: crc_expected,
            actual: crc,
        });
    }

    Ok(Dllp {
        type_byte,
        kind,
        payload,
        crc,
        crc_expected,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(head: [u8; 4]) -> [u8; 6] {
        let crc = dllp_crc16(&head).to_le_bytes();
        [head[0], head[1], head[2], head[3], crc[0], crc[1]]
    }

    #[test]
    fn decodes_ack_with_valid_crc() {
        let bytes = [0x00, 0x00, 0x00, 0x07, 0xD4, 0x20];
        let dllp = decode_dllp(&bytes).unwrap();
        assert_eq!(dllp.kind, DllpKind::Ack);
        assert_eq!(
            dllp.payload,
            DllpPayload::AckNak {
                sequence: 7,
                reserved: 0
            }
        );
        assert!(dllp.crc_valid());
        assert!(dllp.warnings.is_empty());
    }

    #[test]
    fn nak_reserved_bits_are_flagged() {
        let dllp = decode_dllp(&with_crc([0x10, 0x01, 0x00, 0x2A])).unwrap();
        assert_eq!(dllp.kind, DllpKind::Nak);
        assert_eq!(
            dllp.payload,
            DllpPayload::AckNak {
                sequence: 0x02A,
                reserved: 0x010
            }
        );
        assert!(dllp.crc_valid());
        assert!(!dllp.reserved_bits_zero());
    }

    #[test]
    fn corrupted_crc_is_a_warning() {
        let mut bytes = with_crc([0x00, 0x00, 0x00, 0x07]);
        bytes[5] ^= 0x01;
        let dllp = decode_dllp(&bytes).unwrap();
        assert!(!dllp.crc_valid());
        assert_eq!(
            dllp.payload,
            DllpPayload::AckNak {
                sequence: 7,
                reserved: 0
            }
        );
        assert!(matches!(
            dllp.warnings.as_slice(),
            [Warning::DllpCrcInvalid { .. }]
        ));
    }

    #[test]
    fn flow_control_credits_are_scaled() {
        // UpdateFC-Cpl VC1: HdrScale=2, HdrFC=0x10, DataScale=3, DataFC=0x040.
        let content: u32 = (2 << 22) | (0x10 << 14) | (3 << 12) | 0x040;
        let [_, a, b, c] = content.to_be_bytes();
        let dllp = decode_dllp(&with_crc([0xA1, a, b, c])).unwrap();
        assert_eq!(
            dllp.kind,
            DllpKind::FlowControl {
                kind: FcKind::UpdateFc,
                class: CreditClass::Completion,
                vc: 1
            }
        );
        let DllpPayload::FlowControl { credits } = dllp.payload else {
            panic!("expected flow control payload");
        };
        assert_eq!(credits.hdr_fc, 0x10);
        assert_eq!(credits.hdr_credits, 0x40);
        assert_eq!(credits.data_fc, 0x040);
        assert_eq!(credits.data_credits, 0x400);
    }

    #[test]
    fn unscaled_credits_use_multiplier_one() {
        assert_eq!(scale_multiplier(0), 1);
        assert_eq!(scale_multiplier(1), 1);
        assert_eq!(scale_multiplier(2), 4);
        assert_eq!(scale_multiplier(3), 16);
    }

    #[test]
    fn data_link_feature_bits() {
        let dllp = decode_dllp(&with_crc([0x02, 0x80, 0x00, 0x01])).unwrap();
        assert_eq!(
            dllp.payload,
            DllpPayload::Feature {
                ack: true,
                feature_support: 1,
                local_scaled_flow_control: true
            }
        );
    }

    #[test]
    fn power_management_reserved_bytes() {
        let clean = decode_dllp(&with_crc([0x20, 0, 0, 0])).unwrap();
        assert_eq!(clean.kind, DllpKind::PmEnterL1);
        assert!(clean.reserved_bits_zero());

        // 0x22 is in the PM range without a defined name.
        let dirty = decode_dllp(&with_crc([0x22, 0, 0x01, 0])).unwrap();
        assert_eq!(dirty.kind, DllpKind::Unknown { type_byte: 0x22 });
        assert_eq!(dirty.payload, DllpPayload::PowerManagement { reserved: 0x100 });
        assert!(!dirty.reserved_bits_zero());
    }

    #[test]
    fn unknown_types_only_check_crc() {
        let dllp = decode_dllp(&with_crc([0x08, 0xAA, 0xBB, 0xCC])).unwrap();
        assert_eq!(dllp.kind, DllpKind::Unknown { type_byte: 0x08 });
        assert_eq!(dllp.payload, DllpPayload::Unparsed { content: 0xAABBCC });
        assert!(dllp.crc_valid());
    }

    #[test]
    fn multi_root_flow_control_names() {
        assert_eq!(DllpKind::from_type(0x73).name(), "MRInitFC1 (VL3)");
        assert_eq!(DllpKind::from_type(0xF0).name(), "MRInitFC2 (VL0)");
        assert_eq!(DllpKind::from_type(0xB7).name(), "MRUpdateFC (VL7)");
        assert_eq!(DllpKind::from_type(0xC4).name(), "InitFC2-P (VC4)");
    }

    #[test]
    fn flow_control_type_byte_selects_kind_and_class() {
        assert_eq!(DllpKind::from_type(0x60).name(), "InitFC1-Cpl (VC0)");
        assert_eq!(DllpKind::from_type(0x92).name(), "UpdateFC-NP (VC2)");
        assert_eq!(
            DllpKind::from_type(0xD1),
            DllpKind::FlowControl {
                kind: FcKind::InitFc2,
                class: CreditClass::NonPosted,
                vc: 1,
            }
        );
        // Bit 3 set is not a flow-control encoding.
        assert_eq!(DllpKind::from_type(0x48), DllpKind::Unknown { type_byte: 0x48 });
    }

    #[test]
    fn short_dllp_is_rejected() {
        let err = decode_dllp(&[0x00, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            DllpError::TooShort {
                needed: 6,
                actual: 3
            }
        );
        assert!(err.to_string().contains("DLLP too short"));
    }
}
