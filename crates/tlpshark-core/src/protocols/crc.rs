//! Checksums used on the PCIe data link and transaction layers.
//!
//! - DLLP CRC-16: polynomial 0x100B, bit-serial, with a byte-swapped and
//!   bit-reversed result. This is not a table-driven CRC-16 variant and is
//!   kept bit-serial on purpose.
//! - LCRC / ECRC: reflected CRC-32 (0x04C11DB7, i.e. 0xEDB88320 reversed),
//!   initial value and final xor 0xFFFF_FFFF.

pub const DLLP_CRC_POLY: u16 = 0x100B;
pub const DLLP_CRC_INIT: u16 = 0xFFFF;

pub const CRC32_POLY_REFLECTED: u32 = 0xEDB8_8320;
pub const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// DW0 bits treated as variant by ECRC: Type[0] and EP.
pub const ECRC_VARIANT_BITS: u32 = 0x0100_4000;

const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// DLLP CRC-16 over the type byte and three content bytes.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::crc::dllp_crc16;
///
/// // Ack, sequence number 7.
/// assert_eq!(dllp_crc16(&[0x00, 0x00, 0x00, 0x07]), 0x20D4);
/// ```
pub fn dllp_crc16(payload: &[u8]) -> u16 {
    let mut crc = DLLP_CRC_INIT;
    for &byte in payload {
        for bit_index in 0..8u32 {
            let bit = u16::from((byte >> bit_index) & 1) ^ (crc >> 15);
            crc = (crc << 1) | bit;
            if bit != 0 {
                crc ^= DLLP_CRC_POLY & 0xFFFE;
            }
        }
    }
    crc ^= 0xFFFF;
    let low = (crc as u8).reverse_bits();
    let high = ((crc >> 8) as u8).reverse_bits();
    (u16::from(low) << 8) | u16::from(high)
}

/// Running CRC-32 register.
///
/// `finish` applies the final xor; the register itself can keep absorbing
/// bytes, which is how the ECRC seed over the masked DW0 is carried into
/// the rest of the TLP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub const fn new() -> Self {
        Self { state: CRC32_INIT }
    }

    pub fn update(mut self, bytes: &[u8]) -> Self {
        for byte in bytes {
            let index = ((self.state ^ u32::from(*byte)) & 0xFF) as usize;
            self.state = (self.state >> 8) ^ CRC32_TABLE[index];
        }
        self
    }

    pub fn finish(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

/// CRC-32 over `bytes`; the LCRC covers the sequence field and the TLP.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::crc::lcrc32;
///
/// assert_eq!(lcrc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn lcrc32(bytes: &[u8]) -> u32 {
    Crc32::new().update(bytes).finish()
}

/// End-to-end CRC of a TLP whose digest sits at DW `ecrc_dw_offset`.
///
/// DW0 is folded in with its variant bits forced to one, then the running
/// CRC continues over DW1 up to (not including) the ECRC word. `tlp` must
/// hold at least `4 * ecrc_dw_offset` bytes; shorter input is truncated to
/// what is available.
pub fn ecrc32(tlp: &[u8], ecrc_dw_offset: usize) -> u32 {
    let mut dw0 = [0u8; 4];
    let head = tlp.len().min(4);
    dw0[..head].copy_from_slice(&tlp[..head]);
    let masked = u32::from_be_bytes(dw0) | ECRC_VARIANT_BITS;

    let end = (4 * ecrc_dw_offset).min(tlp.len());
    let rest = tlp.get(4..end).unwrap_or(&[]);
    Crc32::new()
        .update(&masked.to_be_bytes())
        .update(rest)
        .finish()
}
