//! Shared decoding primitives: bit fields, bounds-checked readers and the
//! common bounds error.

pub mod bits;
pub mod error;
pub mod reader;

pub use bits::{BitField, read_bits, write_bits};
pub use error::BoundsError;
pub use reader::ByteReader;

/// Render a 16-bit routing ID as `bus:device.function`.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::common::format_bdf;
///
/// assert_eq!(format_bdf(0x0100), "01:00.0");
/// assert_eq!(format_bdf(0x3A0F), "3a:01.7");
/// ```
pub fn format_bdf(id: u16) -> String {
    format!("{:02x}:{:02x}.{}", id >> 8, (id & 0xF8) >> 3, id & 0x7)
}
