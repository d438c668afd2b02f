use crate::protocols::common::BitField;

pub const DLLP_LEN: usize = 6;

pub const TYPE_OFFSET: usize = 0;
pub const CONTENT_OFFSET: usize = 1;
pub const CRC_COVERAGE_LEN: usize = 4;
pub const CRC_OFFSET: usize = 4;

// Bit positions count from the MSB of the type byte.
pub const ACK_NAK_RESERVED: BitField = BitField::new(8, 12);
pub const ACK_NAK_SEQUENCE: BitField = BitField::new(20, 12);

pub const FEATURE_ACK: BitField = BitField::new(8, 1);
pub const FEATURE_SUPPORT: BitField = BitField::new(9, 23);
pub const FEATURE_LOCAL_SCALED_FC: BitField = BitField::new(31, 1);

pub const PM_RESERVED: BitField = BitField::new(8, 24);

pub const FC_HDR_SCALE: BitField = BitField::new(8, 2);
pub const FC_HDR_FC: BitField = BitField::new(10, 8);
pub const FC_DATA_SCALE: BitField = BitField::new(18, 2);
pub const FC_DATA_FC: BitField = BitField::new(20, 12);

pub const TYPE_ACK: u8 = 0x00;
pub const TYPE_MR_INIT: u8 = 0x01;
pub const TYPE_DATA_LINK_FEATURE: u8 = 0x02;
pub const TYPE_NAK: u8 = 0x10;
pub const TYPE_PM_ENTER_L1: u8 = 0x20;
pub const TYPE_PM_ENTER_L23: u8 = 0x21;
pub const TYPE_PM_ACTIVE_STATE_REQUEST_L1: u8 = 0x23;
pub const TYPE_PM_REQUEST_ACK: u8 = 0x24;
pub const TYPE_VENDOR_SPECIFIC: u8 = 0x30;
pub const TYPE_NOP: u8 = 0x31;

pub const PM_TYPE_MASK: u8 = 0xF8;
pub const PM_TYPE_PATTERN: u8 = 0x20;

pub const FC_KIND_MASK: u8 = 0xC0;
pub const FC_CLASS_MASK: u8 = 0x30;
pub const FC_CLASS_POSTED: u8 = 0x00;
pub const FC_CLASS_NON_POSTED: u8 = 0x10;
pub const FC_CLASS_COMPLETION: u8 = 0x20;
pub const FC_RESERVED_BIT: u8 = 0x08;
pub const FC_VC_MASK: u8 = 0x07;
