//! Frame builders for fixtures and tests. The CRCs they append are always
//! correct; corrupt them afterwards to exercise the integrity checks.

use crate::protocols::crc::{dllp_crc16, ecrc32, lcrc32};
use crate::protocols::symbols::{K27_7, K28_2, K29_7};

use super::layout;

/// STP frame around `tlp`: sequence, TLP, LCRC and END.
///
/// # Examples
/// ```
/// use tlpshark_core::protocols::frame::{decode_frame, encode};
///
/// let tlp = [0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x05, 0x0F, 0x00, 0x00, 0x10, 0x00];
/// let frame = decode_frame(&encode::stp_frame(42, &tlp)).unwrap();
/// assert_eq!(frame.summary(), "TLP MRd");
/// assert!(frame.integrity().all_valid());
/// ```
pub fn stp_frame(sequence: u16, tlp: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(layout::TLP_OFFSET + tlp.len() + layout::LCRC_LEN + 1);
    frame.push(K27_7);
    frame.extend_from_slice(&(sequence & 0x0FFF).to_be_bytes());
    frame.extend_from_slice(tlp);
    let lcrc = lcrc32(&frame[layout::LCRC_COVERAGE_START..]);
    frame.extend_from_slice(&lcrc.to_le_bytes());
    frame.push(K29_7);
    frame
}

/// SDP frame for a DLLP type byte and its three content bytes.
pub fn sdp_frame(type_byte: u8, content: [u8; 3]) -> Vec<u8> {
    let mut frame = vec![K28_2, type_byte, content[0], content[1], content[2]];
    let crc = dllp_crc16(&frame[layout::DLLP_OFFSET..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.push(K29_7);
    frame
}

/// Append the ECRC to a TLP whose TD bit is already set.
pub fn append_ecrc(tlp: &mut Vec<u8>) {
    let ecrc = ecrc32(tlp, tlp.len() / 4);
    tlp.extend_from_slice(&ecrc.to_le_bytes());
}
