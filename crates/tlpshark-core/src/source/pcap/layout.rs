use pcap_parser::Linktype;

pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// DLT_USER11, used for analyzer capture records.
pub const LINKTYPE_PCIE_CAPTURE: Linktype = Linktype(158);

pub const BLOCK_TYPE_SECTION_HEADER: u32 = 0x0A0D_0D0A;
pub const BLOCK_TYPE_INTERFACE_DESCRIPTION: u32 = 0x0000_0001;
pub const BLOCK_TYPE_ENHANCED_PACKET: u32 = 0x0000_0006;
pub const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
/// Block type + two length fields.
pub const BLOCK_OVERHEAD: usize = 12;

pub const OPT_END: u16 = 0;
pub const OPT_SHB_USERAPPL: u16 = 4;
pub const OPT_IF_NAME: u16 = 2;
pub const OPT_IF_TSRESOL: u16 = 9;

/// `if_tsresol` for nanoseconds.
pub const TSRESOL_NANOSECONDS: u8 = 9;
/// `if_tsresol` default when the option is absent.
pub const TSRESOL_DEFAULT: u8 = 6;
pub const TSRESOL_POWER_OF_TWO: u8 = 0x80;
