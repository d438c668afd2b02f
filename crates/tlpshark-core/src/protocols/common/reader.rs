use std::ops::Range;

use super::bits::BitField;
use super::error::BoundsError;

/// Bounds-checked view over a captured byte span.
///
/// Accessors take an offset, a `Range` or a `BitField` from a `layout`
/// module so parsers never index bytes directly.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), BoundsError> {
        if self.bytes.len() < needed {
            return Err(BoundsError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, BoundsError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(BoundsError::TooShort {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    /// Byte at `offset`, or `None` past the end. Used for pattern peeks
    /// where a short span simply means "no match".
    pub fn peek_u8(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], BoundsError> {
        self.bytes
            .get(range.clone())
            .ok_or(BoundsError::TooShort {
                needed: range.end,
                actual: self.bytes.len(),
            })
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], BoundsError> {
        let slice = self.read_slice(offset..offset + N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, BoundsError> {
        Ok(u16::from_be_bytes(self.read_array(offset)?))
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16, BoundsError> {
        Ok(u16::from_le_bytes(self.read_array(offset)?))
    }

    /// Big-endian 24-bit value, as carried in DLLP and TLP DW0 bytes 1..4.
    pub fn read_u24_be(&self, offset: usize) -> Result<u32, BoundsError> {
        let [a, b, c] = self.read_array::<3>(offset)?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    pub fn read_u32_be(&self, offset: usize) -> Result<u32, BoundsError> {
        Ok(u32::from_be_bytes(self.read_array(offset)?))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32, BoundsError> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }

    pub fn read_u64_be(&self, offset: usize) -> Result<u64, BoundsError> {
        Ok(u64::from_be_bytes(self.read_array(offset)?))
    }

    pub fn read_u64_le(&self, offset: usize) -> Result<u64, BoundsError> {
        Ok(u64::from_le_bytes(self.read_array(offset)?))
    }

    pub fn read_field(&self, field: BitField) -> Result<u64, BoundsError> {
        field.read(self.bytes)
    }

    pub fn read_flag(&self, field: BitField) -> Result<bool, BoundsError> {
        Ok(field.read(self.bytes)? != 0)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}
