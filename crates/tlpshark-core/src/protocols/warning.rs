//! Non-fatal integrity annotations attached to decoded values.

use serde::{Deserialize, Serialize};

/// Field whose reserved bits were found set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedField {
    /// Upper 4 bits of the STP sequence field.
    TlpSequence,
    /// TLP Length on Cpl/CplLk and Msg without data.
    TlpLength,
    /// Upper 12 bits of an Ack/Nak DLLP.
    AckNak,
    /// Content bytes of a power-management DLLP.
    PowerManagement,
}

impl ReservedField {
    pub fn name(self) -> &'static str {
        match self {
            Self::TlpSequence => "TLP sequence reserved bits",
            Self::TlpLength => "TLP length (reserved for this type)",
            Self::AckNak => "Ack/Nak reserved bits",
            Self::PowerManagement => "PM DLLP reserved bytes",
        }
    }
}

/// Integrity problem found while decoding. Decoding always continues past
/// these; the values that triggered them are reported as captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    DllpCrcInvalid { expected: u16, actual: u16 },
    LcrcInvalid { expected: u32, actual: u32 },
    EcrcInvalid { expected: u32, actual: u32 },
    EndTagInvalid { value: u8 },
    ReservedNonZero { field: ReservedField, value: u32 },
    CompletionStatus { status: u8 },
    SymbolError,
    DisparityError,
}

impl Warning {
    /// Stable identifier used for compliance aggregation.
    pub fn id(&self) -> &'static str {
        match self {
            Self::DllpCrcInvalid { .. } => "PCIE-DLLP-CRC",
            Self::LcrcInvalid { .. } => "PCIE-LCRC",
            Self::EcrcInvalid { .. } => "PCIE-ECRC",
            Self::EndTagInvalid { .. } => "PCIE-END-TAG",
            Self::ReservedNonZero { .. } => "PCIE-RESERVED",
            Self::CompletionStatus { .. } => "PCIE-CPL-STATUS",
            Self::SymbolError => "PCIE-SYMBOL-ERROR",
            Self::DisparityError => "PCIE-DISPARITY-ERROR",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            Self::CompletionStatus { .. } | Self::ReservedNonZero { .. } => "warning",
            _ => "error",
        }
    }

    /// Fixed description shared by every occurrence of this warning id.
    pub fn title(&self) -> &'static str {
        match self {
            Self::DllpCrcInvalid { .. } => "DLLP CRC-16 mismatch",
            Self::LcrcInvalid { .. } => "TLP LCRC mismatch",
            Self::EcrcInvalid { .. } => "TLP ECRC mismatch",
            Self::EndTagInvalid { .. } => "Invalid frame end tag",
            Self::ReservedNonZero { .. } => "Reserved field is non-zero",
            Self::CompletionStatus { .. } => "Completion with unsuccessful status",
            Self::SymbolError => "Symbol error flagged by analyzer",
            Self::DisparityError => "Disparity error flagged by analyzer",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::DllpCrcInvalid { expected, actual } => {
                format!("DLLP CRC invalid: got 0x{actual:04x}, expected 0x{expected:04x}")
            }
            Self::LcrcInvalid { expected, actual } => {
                format!("LCRC invalid: got 0x{actual:08x}, expected 0x{expected:08x}")
            }
            Self::EcrcInvalid { expected, actual } => {
                format!("ECRC invalid: got 0x{actual:08x}, expected 0x{expected:08x}")
            }
            Self::EndTagInvalid { value } => format!("invalid end tag 0x{value:02x}"),
            Self::ReservedNonZero { field, value } => {
                format!("{} non-zero: 0x{value:x}", field.name())
            }
            Self::CompletionStatus { status } => format!(
                "completion status {} ({status:#05b})",
                crate::protocols::tlp::CompletionStatus::from_bits(*status).short_name()
            ),
            Self::SymbolError => "symbol error reported by analyzer".to_string(),
            Self::DisparityError => "disparity error reported by analyzer".to_string(),
        }
    }
}
