//! Analyzer record header: 20 bytes, little-endian.

pub const HEADER_LEN: usize = 20;

pub const RECORD_OFFSET: usize = 0;
pub const TIMESTAMP_OFFSET: usize = 4;
pub const LFSR_OFFSET: usize = 12;
pub const METADATA_INFO_OFFSET: usize = 14;
pub const FLAGS_OFFSET: usize = 16;

pub const EXTRA_METADATA_PRESENT: u16 = 0x8000;
pub const METADATA_OFFSET_MASK: u16 = 0x7FFF;

pub const FLAG_GAP: u32 = 0x4000_0000;
pub const FLAG_SCRAMBLED: u32 = 0x2000_0000;
pub const FLAG_DIRECTION_UPSTREAM: u32 = 0x1000_0000;
pub const FLAG_ELECTRICAL_IDLE_MASK: u32 = 0x0FFF_F000;
pub const FLAG_ELECTRICAL_IDLE_SHIFT: u32 = 12;
pub const FLAG_DISPARITY_ERROR: u32 = 0x0000_0800;
pub const FLAG_CHANNEL_BONDED: u32 = 0x0000_0400;
pub const FLAG_LINK_SPEED_MASK: u32 = 0x0000_0300;
pub const FLAG_LINK_SPEED_SHIFT: u32 = 8;
pub const FLAG_START_LANE_MASK: u32 = 0x0000_00F0;
pub const FLAG_START_LANE_SHIFT: u32 = 4;
pub const FLAG_SYMBOL_ERROR: u32 = 0x0000_0008;
pub const FLAG_LINK_WIDTH_MASK: u32 = 0x0000_0007;

/// One {K-symbol bitmap, disparity bitmap} pair covers eight data bytes.
pub const SYMBOL_META_PAIR_LEN: usize = 2;
pub const SYMBOL_META_BYTES_PER_PAIR: usize = 8;

// Extra metadata word chain (big-endian u16 words).
pub const EXTRA_WORD_LEN: usize = 2;
pub const EXTRA_START_CHAIN: u16 = 0x0001;
pub const EXTRA_WORD_KIND_MASK: u16 = 0x0003;
pub const EXTRA_WORD_KIND_END: u16 = 0;
pub const EXTRA_WORD_KIND_LAST: u16 = 1;
pub const EXTRA_WORD_LEN_SHIFT: u32 = 4;

// LFSR metadata block control byte.
pub const LFSR_CONTROL_STATE_PRESENT: u8 = 0x40;
pub const LFSR_CONTROL_TYPE_MASK: u8 = 0x30;
pub const LFSR_CONTROL_TYPE_SHIFT: u32 = 4;
pub const LFSR_CONTROL_LINK_SPEED_MASK: u8 = 0x03;
