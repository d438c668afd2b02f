use crate::protocols::common::BitField;

pub const START_TAG_OFFSET: usize = 0;
pub const END_TAG_LEN: usize = 1;

// STP framing: reserved(4) + sequence(12) ahead of the TLP.
pub const STP_SEQUENCE_RESERVED: BitField = BitField::new(8, 4);
pub const STP_SEQUENCE: BitField = BitField::new(12, 12);
pub const TLP_OFFSET: usize = 3;
pub const LCRC_LEN: usize = 4;
/// LCRC coverage starts at the sequence field.
pub const LCRC_COVERAGE_START: usize = 1;

// SDP framing.
pub const DLLP_OFFSET: usize = 1;
pub const DLLP_END_TAG_OFFSET: usize = 7;

// Ordered sets following COM.
pub const OS_TYPE_OFFSET: usize = 1;
pub const TS_LEN: usize = 7;
pub const TS_LINK_NUMBER_OFFSET: usize = 1;
pub const TS_LANE_NUMBER_OFFSET: usize = 2;
pub const TS_N_FTS_OFFSET: usize = 3;
pub const TS_DATA_RATE: BitField = BitField::new(32, 8);
pub const TS_DATA_RATE_SPEED_CHANGE: BitField = BitField::new(32, 1);
pub const TS_DATA_RATE_AUTONOMOUS_CHANGE: BitField = BitField::new(33, 1);
pub const TS_DATA_RATE_LINK_SPEEDS: BitField = BitField::new(34, 5);
pub const TS_DATA_RATE_FLIT_MODE: BitField = BitField::new(39, 1);
pub const TS_TRAINING_CONTROL: BitField = BitField::new(40, 8);
pub const TS_TC_ELBC: BitField = BitField::new(40, 2);
pub const TS_TC_TMCPL: BitField = BitField::new(42, 1);
pub const TS_TC_COMPLIANCE_RECEIVE: BitField = BitField::new(43, 1);
pub const TS_TC_DISABLE_SCRAMBLING: BitField = BitField::new(44, 1);
pub const TS_TC_LOOPBACK: BitField = BitField::new(45, 1);
pub const TS_TC_DISABLE_LINK: BitField = BitField::new(46, 1);
pub const TS_TC_HOT_RESET: BitField = BitField::new(47, 1);
pub const TS_IDENTIFIER_OFFSET: usize = 6;

pub const TS1_IDENTIFIER: u8 = 0x4A;
pub const TS2_IDENTIFIER: u8 = 0x45;
pub const TS1_IDENTIFIER_INVERTED: u8 = 0xB5;
pub const TS2_IDENTIFIER_INVERTED: u8 = 0xBA;
