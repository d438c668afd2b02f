use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// ```
/// use tlpshark_core::source::pcap::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

/// Check whether the magic bytes match PCAPNG.
pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Resolve the linktype for a given interface id.
///
/// # Examples
/// ```
/// use tlpshark_core::source::pcap::reader::linktype_for_interface;
/// use pcap_parser::Linktype;
///
/// let linktypes = [Linktype(158)];
/// assert_eq!(linktype_for_interface(&linktypes, 0), Some(Linktype(158)));
/// assert_eq!(linktype_for_interface(&linktypes, 1), None);
/// ```
pub fn linktype_for_interface(linktypes: &[Linktype], if_id: u32) -> Option<Linktype> {
    linktypes.get(if_id as usize).copied()
}

/// Timestamp units per second for an `if_tsresol` value: a power of ten,
/// or a power of two when the high bit is set. `None` if it overflows.
///
/// # Examples
/// ```
/// use tlpshark_core::source::pcap::reader::tsresol_units_per_second;
///
/// assert_eq!(tsresol_units_per_second(6), Some(1_000_000));
/// assert_eq!(tsresol_units_per_second(9), Some(1_000_000_000));
/// assert_eq!(tsresol_units_per_second(0x8A), Some(1024));
/// assert_eq!(tsresol_units_per_second(20), None);
/// ```
pub fn tsresol_units_per_second(tsresol: u8) -> Option<u64> {
    if tsresol & layout::TSRESOL_POWER_OF_TWO != 0 {
        2u64.checked_pow(u32::from(tsresol & !layout::TSRESOL_POWER_OF_TWO))
    } else {
        10u64.checked_pow(u32::from(tsresol))
    }
}

/// Convert a PCAPNG high/low timestamp to seconds.
///
/// # Examples
/// ```
/// use tlpshark_core::source::pcap::reader::pcapng_ts_to_seconds;
///
/// let seconds = pcapng_ts_to_seconds(0, 1_500_000, 6).unwrap();
/// assert!((seconds - 1.5).abs() < f64::EPSILON);
/// let seconds = pcapng_ts_to_seconds(0, 2_500_000_000, 9).unwrap();
/// assert!((seconds - 2.5).abs() < f64::EPSILON);
/// ```
pub fn pcapng_ts_to_seconds(ts_high: u32, ts_low: u32, tsresol: u8) -> Option<f64> {
    let units = tsresol_units_per_second(tsresol)?;
    let ts = (u64::from(ts_high) << 32) | u64::from(ts_low);
    let whole = ts / units;
    let frac = ts % units;
    Some(whole as f64 + frac as f64 / units as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detect_pcapng_magic() {
        assert!(is_pcapng_magic(&layout::PCAPNG_MAGIC));
        assert!(!is_pcapng_magic(&[0xd4, 0xc3, 0xb2, 0xa1]));
    }

    #[test]
    fn read_magic_rewinds() {
        let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
        let mut cursor = Cursor::new(bytes);
        let magic = read_magic_and_rewind(&mut cursor).unwrap();
        assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
        let mut buf = [0u8; 1];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 0x0a);
    }

    #[test]
    fn read_magic_too_short() {
        let mut cursor = Cursor::new([0x0a, 0x0d, 0x0d]);
        let err = read_magic_and_rewind(&mut cursor).unwrap_err();
        assert!(matches!(err, PcapSourceError::Io(_)));
    }

    #[test]
    fn nanosecond_timestamps_keep_precision() {
        let ts: u64 = 5_000_000_123;
        let seconds = pcapng_ts_to_seconds((ts >> 32) as u32, ts as u32, 9).unwrap();
        assert!((seconds - 5.000_000_123).abs() < 1e-9);
    }
}
