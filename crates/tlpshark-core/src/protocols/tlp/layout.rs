use crate::protocols::common::BitField;

pub const DW_LEN: usize = 4;
pub const HEADER_DW_3: usize = 3;
pub const HEADER_DW_4: usize = 4;
pub const MAX_PAYLOAD_DW: u32 = 1024;
pub const MAX_BYTE_COUNT: u16 = 4096;

pub const FMT_TYPE_OFFSET: usize = 0;
pub const FMT_PREFIX: u8 = 0b100;
pub const FMT_4DW: u8 = 0b001;
pub const FMT_WITH_DATA: u8 = 0b010;

// DW0, bit 0 = MSB of the Fmt/Type byte.
pub const FMT: BitField = BitField::new(0, 3);
pub const TYPE: BitField = BitField::new(3, 5);
pub const TAG9: BitField = BitField::new(8, 1);
pub const TC: BitField = BitField::new(9, 3);
pub const TAG8: BitField = BitField::new(12, 1);
pub const ATTR2: BitField = BitField::new(13, 1);
pub const LN: BitField = BitField::new(14, 1);
pub const TH: BitField = BitField::new(15, 1);
pub const TD: BitField = BitField::new(16, 1);
pub const EP: BitField = BitField::new(17, 1);
pub const ATTR: BitField = BitField::new(18, 2);
pub const AT: BitField = BitField::new(20, 2);
pub const LENGTH: BitField = BitField::new(22, 10);

// Request header (memory, I/O, configuration, message).
pub const REQUESTER_ID_OFFSET: usize = 4;
pub const TAG_OFFSET: usize = 6;
pub const LAST_BE: BitField = BitField::new(56, 4);
pub const FIRST_BE: BitField = BitField::new(60, 4);
pub const MESSAGE_CODE_OFFSET: usize = 7;

pub const ADDRESS_OFFSET: usize = 8;
pub const ADDRESS_MASK: u64 = !0b11;
pub const PROCESSING_HINT_MASK: u64 = 0b11;

pub const CFG_COMPLETER_ID_OFFSET: usize = 8;
pub const CFG_REGISTER_OFFSET: usize = 10;
pub const CFG_REGISTER_MASK: u16 = 0x0FFC;
pub const CFG_REGISTER_SHIFT: u32 = 2;

// Completion header.
pub const CPL_COMPLETER_ID_OFFSET: usize = 4;
pub const CPL_STATUS: BitField = BitField::new(48, 3);
pub const CPL_BCM: BitField = BitField::new(51, 1);
pub const CPL_BYTE_COUNT: BitField = BitField::new(52, 12);
pub const CPL_REQUESTER_ID_OFFSET: usize = 8;
pub const CPL_TAG_OFFSET: usize = 10;
pub const CPL_LOWER_ADDRESS: BitField = BitField::new(89, 7);
