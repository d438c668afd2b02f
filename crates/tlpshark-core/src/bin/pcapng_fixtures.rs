//! Writes small analyzer captures under `tests/fixtures/` (or the directory
//! given as the first argument) for manual runs of the CLI.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tlpshark_core::protocols::capture::Direction;
use tlpshark_core::protocols::frame::encode::{sdp_frame, stp_frame};
use tlpshark_core::source::pcap::{CaptureRecordBuilder, PcapngWriter};

const LINK_SPEED_2_5GT: u8 = 1;
const LINK_WIDTH_X4: u8 = 2;
const RECORD_SPACING_NS: u64 = 250;

const REQUESTER_ID: u16 = 0x0100;
const COMPLETER_ID: u16 = 0x0000;

fn main() -> Result<(), String> {
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures"));
    write_capture(&root.join("read_split").join("input.pcapng"), read_split())?;
    write_capture(&root.join("config_read").join("input.pcapng"), config_read())?;
    write_capture(&root.join("bad_lcrc").join("input.pcapng"), bad_lcrc())?;
    Ok(())
}

/// MRd of 32 DW answered by two CplD, with the Acks in between.
fn read_split() -> Vec<(Direction, Vec<u8>)> {
    vec![
        (Direction::Downstream, stp_frame(1, &mem_read(0x05, 32))),
        (Direction::Upstream, sdp_frame(0x00, [0x00, 0x00, 0x01])),
        (Direction::Upstream, stp_frame(7, &completion(0x05, 128, 16, 0x00))),
        (Direction::Upstream, stp_frame(8, &completion(0x05, 64, 16, 0x40))),
        (Direction::Downstream, sdp_frame(0x00, [0x00, 0x00, 0x08])),
    ]
}

fn config_read() -> Vec<(Direction, Vec<u8>)> {
    let mut cfg = vec![0x04, 0x00, 0x00, 0x01];
    cfg.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    cfg.extend_from_slice(&[0x01, 0x0F, 0x01, 0x00, 0x00, 0x00]);
    vec![
        (Direction::Downstream, stp_frame(2, &cfg)),
        (Direction::Upstream, stp_frame(9, &completion(0x01, 4, 1, 0x00))),
    ]
}

fn bad_lcrc() -> Vec<(Direction, Vec<u8>)> {
    let mut frame = stp_frame(3, &mem_read(0x06, 1));
    let lcrc_byte = frame.len() - 2;
    frame[lcrc_byte] ^= 0x01;
    vec![
        (Direction::Downstream, frame),
        (Direction::Upstream, sdp_frame(0x10, [0x00, 0x00, 0x02])),
    ]
}

fn mem_read(tag: u8, length_dw: u16) -> Vec<u8> {
    let mut tlp = vec![0x00, 0x00, (length_dw >> 8) as u8 & 0x03, length_dw as u8];
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, 0xFF, 0x00, 0x00, 0x10, 0x00]);
    tlp
}

fn completion(tag: u8, byte_count: u16, length_dw: u16, lower_address: u8) -> Vec<u8> {
    let mut tlp = vec![0x4A, 0x00, (length_dw >> 8) as u8 & 0x03, length_dw as u8];
    tlp.extend_from_slice(&COMPLETER_ID.to_be_bytes());
    tlp.extend_from_slice(&[(byte_count >> 8) as u8 & 0x0F, byte_count as u8]);
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, lower_address & 0x7F]);
    for dw in 0..u32::from(length_dw) {
        tlp.extend_from_slice(&dw.to_le_bytes());
    }
    tlp
}

fn write_capture(path: &Path, frames: Vec<(Direction, Vec<u8>)>) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create {}: {}", parent.display(), err))?;
    }
    let file = File::create(path)
        .map_err(|err| format!("failed to create {}: {}", path.display(), err))?;

    let mut writer = PcapngWriter::new(BufWriter::new(file), "tlpshark fixtures")
        .map_err(|err| err.to_string())?;
    let interface = writer.add_interface("link0").map_err(|err| err.to_string())?;
    for (idx, (direction, frame)) in frames.into_iter().enumerate() {
        let record = CaptureRecordBuilder::new(idx as u32, (idx as u64 + 1) * RECORD_SPACING_NS)
            .direction(direction)
            .link(LINK_SPEED_2_5GT, LINK_WIDTH_X4)
            .frame(&frame);
        writer
            .write_record(interface, &record)
            .map_err(|err| err.to_string())?;
    }
    writer.finish().map_err(|err| err.to_string())?;
    Ok(())
}
