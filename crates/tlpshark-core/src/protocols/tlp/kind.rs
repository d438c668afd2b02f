//! Fmt/Type classification and the name tables that go with it.

use serde::{Deserialize, Serialize};

use super::layout;

/// TLP kind, decoded once from the Fmt/Type byte.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::tlp::TlpKind;
///
/// let kind = TlpKind::from_fmt_type(0x20);
/// assert_eq!(kind, TlpKind::MemRead { addr64: true });
/// assert_eq!(kind.short_name(), "MRd");
/// assert!(kind.is_non_posted_request());
/// assert!(TlpKind::from_fmt_type(0x40).is_posted());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TlpKind {
    MemRead { addr64: bool },
    MemReadLocked { addr64: bool },
    MemWrite { addr64: bool },
    IoRead,
    IoWrite,
    CfgRead { cfg_type: u8 },
    CfgWrite { cfg_type: u8 },
    TCfgRead,
    TCfgWrite,
    Message { routing: u8, with_data: bool },
    Completion { with_data: bool, locked: bool },
    FetchAdd { addr64: bool },
    Swap { addr64: bool },
    Cas { addr64: bool },
    Prefix { end_to_end: bool },
    Unknown { fmt_type: u8 },
}

impl TlpKind {
    pub fn from_fmt_type(fmt_type: u8) -> Self {
        let fmt = fmt_type >> 5;
        let ty = fmt_type & 0x1F;
        if fmt >= layout::FMT_PREFIX {
            return Self::Prefix {
                end_to_end: ty & 0x10 != 0,
            };
        }
        let addr64 = fmt & layout::FMT_4DW != 0;
        match (fmt, ty) {
            (0b000 | 0b001, 0b00000) => Self::MemRead { addr64 },
            (0b000 | 0b001, 0b00001) => Self::MemReadLocked { addr64 },
            (0b010 | 0b011, 0b00000) => Self::MemWrite { addr64 },
            (0b000, 0b00010) => Self::IoRead,
            (0b010, 0b00010) => Self::IoWrite,
            (0b000, 0b00100 | 0b00101) => Self::CfgRead { cfg_type: ty & 1 },
            (0b010, 0b00100 | 0b00101) => Self::CfgWrite { cfg_type: ty & 1 },
            (0b000, 0b11011) => Self::TCfgRead,
            (0b010, 0b11011) => Self::TCfgWrite,
            (0b001 | 0b011, 0b10000..=0b10111) => Self::Message {
                routing: ty & 0x07,
                with_data: fmt == 0b011,
            },
            (0b000 | 0b010, 0b01010 | 0b01011) => Self::Completion {
                with_data: fmt == 0b010,
                locked: ty == 0b01011,
            },
            (0b010 | 0b011, 0b01100) => Self::FetchAdd { addr64 },
            (0b010 | 0b011, 0b01101) => Self::Swap { addr64 },
            (0b010 | 0b011, 0b01110) => Self::Cas { addr64 },
            _ => Self::Unknown { fmt_type },
        }
    }

    pub fn short_name(&self) -> String {
        match self {
            Self::MemRead { .. } => "MRd".to_string(),
            Self::MemReadLocked { .. } => "MRdLk".to_string(),
            Self::MemWrite { .. } => "MWr".to_string(),
            Self::IoRead => "IORd".to_string(),
            Self::IoWrite => "IOWr".to_string(),
            Self::CfgRead { cfg_type } => format!("CfgRd{cfg_type}"),
            Self::CfgWrite { cfg_type } => format!("CfgWr{cfg_type}"),
            Self::TCfgRead => "TCfgRd".to_string(),
            Self::TCfgWrite => "TCfgWr".to_string(),
            Self::Message { routing, with_data } => {
                let base = if *with_data { "MsgD" } else { "Msg" };
                format!("{base} ({})", message_routing_name(*routing))
            }
            Self::Completion { with_data, locked } => match (with_data, locked) {
                (false, false) => "Cpl".to_string(),
                (true, false) => "CplD".to_string(),
                (false, true) => "CplLk".to_string(),
                (true, true) => "CplDLk".to_string(),
            },
            Self::FetchAdd { .. } => "FetchAdd".to_string(),
            Self::Swap { addr64 } => format!("Swap-{}", if *addr64 { 64 } else { 32 }),
            Self::Cas { addr64 } => format!("CAS-{}", if *addr64 { 64 } else { 32 }),
            Self::Prefix { end_to_end } => {
                if *end_to_end { "EPrfx" } else { "LPrfx" }.to_string()
            }
            Self::Unknown { fmt_type } => format!("Unknown TLP FMT (0x{fmt_type:02X})"),
        }
    }

    /// Memory writes and messages; no completion is expected.
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::MemWrite { .. } | Self::Message { .. })
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion { .. })
    }

    pub fn is_config_request(&self) -> bool {
        matches!(self, Self::CfgRead { .. } | Self::CfgWrite { .. })
    }

    pub fn is_non_posted_request(&self) -> bool {
        !self.is_posted()
            && !self.is_completion()
            && !matches!(self, Self::Prefix { .. } | Self::Unknown { .. })
    }

    /// Cpl/CplLk and Msg without data neither carry nor refer to a payload,
    /// so their Length field is reserved.
    pub fn has_reserved_length(&self) -> bool {
        matches!(
            self,
            Self::Completion {
                with_data: false,
                ..
            } | Self::Message {
                with_data: false,
                ..
            }
        )
    }
}

pub fn message_routing_name(routing: u8) -> &'static str {
    match routing & 0x07 {
        0b000 => "Routed to Root Complex",
        0b001 => "Routed by Address",
        0b010 => "Routed by ID",
        0b011 => "Broadcast from Root Complex",
        0b100 => "Local - Terminate at Receiver",
        0b101 => "Gathered and routed to Root Complex",
        _ => "Reserved - Terminate at Receiver",
    }
}

/// Completion status field (DW1 bits 15:13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    SuccessfulCompletion,
    UnsupportedRequest,
    ConfigRequestRetry,
    CompleterAbort,
    Reserved(u8),
}

impl CompletionStatus {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => Self::SuccessfulCompletion,
            0b001 => Self::UnsupportedRequest,
            0b010 => Self::ConfigRequestRetry,
            0b100 => Self::CompleterAbort,
            other => Self::Reserved(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::SuccessfulCompletion => 0b000,
            Self::UnsupportedRequest => 0b001,
            Self::ConfigRequestRetry => 0b010,
            Self::CompleterAbort => 0b100,
            Self::Reserved(bits) => bits,
        }
    }

    pub fn is_successful(self) -> bool {
        self == Self::SuccessfulCompletion
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::SuccessfulCompletion => "SC",
            Self::UnsupportedRequest => "UR",
            Self::ConfigRequestRetry => "CRS",
            Self::CompleterAbort => "CA",
            Self::Reserved(_) => "Reserved",
        }
    }
}

pub fn message_code_name(code: u8) -> Option<&'static str> {
    let name = match code {
        0x00 => "Unlock",
        0x01 => "Invalidate Request Message",
        0x02 => "Invalidate Completion Message",
        0x04 => "Page Request Message",
        0x05 => "PRG Response Message",
        0x10 => "LTR",
        0x12 => "OBFF",
        0x14 => "PM_Active_State_Nak",
        0x18 => "PM_PME",
        0x19 => "PME_Turn_Off",
        0x1B => "PME_TO_Ack",
        0x20 => "Assert_INTA",
        0x21 => "Assert_INTB",
        0x22 => "Assert_INTC",
        0x23 => "Assert_INTD",
        0x24 => "Deassert_INTA",
        0x25 => "Deassert_INTB",
        0x26 => "Deassert_INTC",
        0x27 => "Deassert_INTD",
        0x30 => "ERR_COR",
        0x31 => "ERR_NONFATAL",
        0x33 => "ERR_FATAL",
        0x40 => "Attention_Indicator_Off",
        0x41 => "Attention_Indicator_On",
        0x43 => "Attention_Indicator_Blink",
        0x44 => "Power_Indicator_Off",
        0x45 => "Power_Indicator_On",
        0x47 => "Power_Indicator_Blink",
        0x48 => "Attention_Button_Pressed",
        0x50 => "Set_Slot_Power_Limit",
        0x52 => "PTM Request",
        0x53 => "PTM Response",
        0x7E => "Vendor_Defined Type 0",
        0x7F => "Vendor_Defined Type 1",
        _ => return None,
    };
    Some(name)
}

/// Names of the type-0 header registers worth labelling, by DW index.
pub fn config_register_name(register: u16) -> Option<&'static str> {
    let name = match register {
        0x000 => "DID/VID",
        0x001 => "Status/Command",
        0x002 => "Class/Revision",
        0x003 => "BIST/Header Type/Latency Timer/Cache Line Size",
        0x00D => "Capabilities",
        0x00F => "Interrupt Line/Pin",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_fmt_type_patterns() {
        for fmt_type in 0..=u8::MAX {
            let kind = TlpKind::from_fmt_type(fmt_type);
            if fmt_type >> 5 >= 0b100 {
                assert!(matches!(kind, TlpKind::Prefix { .. }));
                continue;
            }
            let posted = (fmt_type & 0xDF) == 0x40 || (fmt_type & 0xB8) == 0x30;
            let completion = (fmt_type & 0xBE) == 0x0A;
            let config = (fmt_type & 0xBE) == 0x04;
            let no_data = (fmt_type & 0xFE) == 0x0A || (fmt_type & 0xF8) == 0x30;
            assert_eq!(kind.is_posted(), posted, "posted {fmt_type:#04x}");
            assert_eq!(kind.is_completion(), completion, "cpl {fmt_type:#04x}");
            assert_eq!(kind.is_config_request(), config, "cfg {fmt_type:#04x}");
            assert_eq!(kind.has_reserved_length(), no_data, "no data {fmt_type:#04x}");
        }
    }

    #[test]
    fn short_names() {
        assert_eq!(TlpKind::from_fmt_type(0x00).short_name(), "MRd");
        assert_eq!(TlpKind::from_fmt_type(0x21).short_name(), "MRdLk");
        assert_eq!(TlpKind::from_fmt_type(0x60).short_name(), "MWr");
        assert_eq!(TlpKind::from_fmt_type(0x45).short_name(), "CfgWr1");
        assert_eq!(TlpKind::from_fmt_type(0x1B).short_name(), "TCfgRd");
        assert_eq!(TlpKind::from_fmt_type(0x4A).short_name(), "CplD");
        assert_eq!(TlpKind::from_fmt_type(0x0B).short_name(), "CplLk");
        assert_eq!(
            TlpKind::from_fmt_type(0x34).short_name(),
            "Msg (Local - Terminate at Receiver)"
        );
        assert_eq!(
            TlpKind::from_fmt_type(0x72).short_name(),
            "MsgD (Routed by ID)"
        );
        assert_eq!(TlpKind::from_fmt_type(0x6D).short_name(), "Swap-64");
        assert_eq!(TlpKind::from_fmt_type(0x4E).short_name(), "CAS-32");
        assert_eq!(TlpKind::from_fmt_type(0x90).short_name(), "EPrfx");
        assert_eq!(
            TlpKind::from_fmt_type(0x03).short_name(),
            "Unknown TLP FMT (0x03)"
        );
    }

    #[test]
    fn completion_status_round_trips() {
        for bits in 0..8u8 {
            assert_eq!(CompletionStatus::from_bits(bits).bits(), bits);
        }
        assert!(CompletionStatus::from_bits(0).is_successful());
        assert_eq!(CompletionStatus::from_bits(2).short_name(), "CRS");
        assert_eq!(CompletionStatus::from_bits(3).short_name(), "Reserved");
    }

    #[test]
    fn message_and_register_tables() {
        assert_eq!(message_code_name(0x20), Some("Assert_INTA"));
        assert_eq!(message_code_name(0x7F), Some("Vendor_Defined Type 1"));
        assert_eq!(message_code_name(0x99), None);
        assert_eq!(config_register_name(0x00D), Some("Capabilities"));
        assert_eq!(config_register_name(0x004), None);
    }
}
