//! 8b/10b control symbols as they appear in decoded capture bytes.

use serde::{Deserialize, Serialize};

pub const K28_0: u8 = 0x1C;
pub const K28_1: u8 = 0x3C;
pub const K28_2: u8 = 0x5C;
pub const K28_3: u8 = 0x7C;
pub const K28_4: u8 = 0x9C;
pub const K28_5: u8 = 0xBC;
pub const K28_6: u8 = 0xDC;
pub const K28_7: u8 = 0xFC;
pub const K23_7: u8 = 0xF7;
pub const K27_7: u8 = 0xFB;
pub const K29_7: u8 = 0xFD;
pub const K30_7: u8 = 0xFE;

/// A K-symbol with its PCIe framing role.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::symbols::KSymbol;
///
/// assert_eq!(KSymbol::from_byte(0xFB), Some(KSymbol::Stp));
/// assert_eq!(KSymbol::Stp.name(), "STP (Start TLP)");
/// assert_eq!(KSymbol::from_byte(0x00), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KSymbol {
    /// K28.5
    Com,
    /// K27.7
    Stp,
    /// K28.2
    Sdp,
    /// K29.7
    End,
    /// K30.7
    Edb,
    /// K23.7
    Pad,
    /// K28.0
    Skp,
    /// K28.1
    Fts,
    /// K28.3
    Idl,
    /// K28.4
    Reserved284,
    /// K28.6
    Reserved286,
    /// K28.7
    Eie,
}

impl KSymbol {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let symbol = match byte {
            K28_5 => Self::Com,
            K27_7 => Self::Stp,
            K28_2 => Self::Sdp,
            K29_7 => Self::End,
            K30_7 => Self::Edb,
            K23_7 => Self::Pad,
            K28_0 => Self::Skp,
            K28_1 => Self::Fts,
            K28_3 => Self::Idl,
            K28_4 => Self::Reserved284,
            K28_6 => Self::Reserved286,
            K28_7 => Self::Eie,
            _ => return None,
        };
        Some(symbol)
    }

    pub fn byte(self) -> u8 {
        match self {
            Self::Com => K28_5,
            Self::Stp => K27_7,
            Self::Sdp => K28_2,
            Self::End => K29_7,
            Self::Edb => K30_7,
            Self::Pad => K23_7,
            Self::Skp => K28_0,
            Self::Fts => K28_1,
            Self::Idl => K28_3,
            Self::Reserved284 => K28_4,
            Self::Reserved286 => K28_6,
            Self::Eie => K28_7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Com => "COM (Comma)",
            Self::Stp => "STP (Start TLP)",
            Self::Sdp => "SDP (Start DLLP)",
            Self::End => "END (End)",
            Self::Edb => "EDB (EnD Bad)",
            Self::Pad => "PAD (Pad)",
            Self::Skp => "SKP (Skip)",
            Self::Fts => "FTS (Fast Training Sequence)",
            Self::Idl => "IDL (Idle)",
            Self::Reserved284 => "K28.4 (Reserved)",
            Self::Reserved286 => "K28.6 (Reserved)",
            Self::Eie => "EIE (Electrical Idle Exit)",
        }
    }

    /// Valid frame terminators: END, or EDB for a nullified TLP.
    pub fn is_end(self) -> bool {
        matches!(self, Self::End | Self::Edb)
    }
}
