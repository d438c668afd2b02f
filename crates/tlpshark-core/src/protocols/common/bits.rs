//! Big-endian bit-range access over byte buffers.
//!
//! Bit 0 is the most significant bit of byte 0, matching PCIe header
//! diagrams. Fields may straddle byte boundaries and be up to 64 bits wide.

use super::error::BoundsError;

pub const MAX_BIT_WIDTH: u32 = 64;

/// A fixed bit range inside a header, used by the `layout` modules.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::common::BitField;
///
/// // Length field of TLP DW0 (bits 22..32).
/// const LENGTH: BitField = BitField::new(22, 10);
/// assert_eq!(LENGTH.read(&[0x20, 0x00, 0x00, 0x04]).unwrap(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub offset: usize,
    pub width: u32,
}

impl BitField {
    pub const fn new(offset: usize, width: u32) -> Self {
        Self { offset, width }
    }

    pub fn read(&self, buf: &[u8]) -> Result<u64, BoundsError> {
        read_bits(buf, self.offset, self.width)
    }

    pub fn write(&self, buf: &mut [u8], value: u64) -> Result<(), BoundsError> {
        write_bits(buf, self.offset, self.width, value)
    }
}

/// Read `bit_width` bits starting at `bit_offset`.
///
/// # Errors
/// Returns `BoundsError::InvalidWidth` for widths outside `1..=64` and
/// `BoundsError::TooShort` when the range runs past the buffer.
pub fn read_bits(buf: &[u8], bit_offset: usize, bit_width: u32) -> Result<u64, BoundsError> {
    check_range(buf.len(), bit_offset, bit_width)?;

    let first = bit_offset / 8;
    let last = (bit_offset + bit_width as usize - 1) / 8;
    // At most 9 bytes are covered by a 64-bit field, which fits in u128.
    let acc = buf[first..=last]
        .iter()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte));
    let covered_bits = (last - first + 1) * 8;
    let trailing = covered_bits - (bit_offset % 8) - bit_width as usize;
    let mask = (1u128 << bit_width) - 1;
    Ok(((acc >> trailing) & mask) as u64)
}

/// Pack the low `bit_width` bits of `value` at `bit_offset`.
///
/// Bits outside the range are left untouched; higher bits of `value` are
/// ignored.
///
/// # Errors
/// Same conditions as [`read_bits`].
pub fn write_bits(
    buf: &mut [u8],
    bit_offset: usize,
    bit_width: u32,
    value: u64,
) -> Result<(), BoundsError> {
    check_range(buf.len(), bit_offset, bit_width)?;

    for i in 0..bit_width as usize {
        let bit = (value >> (bit_width as usize - 1 - i)) & 1;
        let pos = bit_offset + i;
        let mask = 0x80u8 >> (pos % 8);
        if bit == 1 {
            buf[pos / 8] |= mask;
        } else {
            buf[pos / 8] &= !mask;
        }
    }
    Ok(())
}

fn check_range(len: usize, bit_offset: usize, bit_width: u32) -> Result<(), BoundsError> {
    if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
        return Err(BoundsError::InvalidWidth { width: bit_width });
    }
    let needed = bit_offset
        .checked_add(bit_width as usize)
        .map(|end| end.div_ceil(8))
        .unwrap_or(usize::MAX);
    if needed > len {
        return Err(BoundsError::TooShort {
            needed,
            actual: len,
        });
    }
    Ok(())
}
