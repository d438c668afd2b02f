#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tlpshark_core::protocols::capture::Direction;
use tlpshark_core::source::pcap::{CaptureRecordBuilder, PcapngWriter};

pub const REQUESTER_ID: u16 = 0x0100;

/// One analyzer record to write: interface, timestamp, direction, frame.
pub struct Unit {
    pub interface: u32,
    pub timestamp_ns: u64,
    pub direction: Direction,
    pub frame: Vec<u8>,
}

impl Unit {
    pub fn down(timestamp_ns: u64, frame: Vec<u8>) -> Self {
        Self {
            interface: 0,
            timestamp_ns,
            direction: Direction::Downstream,
            frame,
        }
    }

    pub fn up(timestamp_ns: u64, frame: Vec<u8>) -> Self {
        Self {
            interface: 0,
            timestamp_ns,
            direction: Direction::Upstream,
            frame,
        }
    }

    pub fn on(mut self, interface: u32) -> Self {
        self.interface = interface;
        self
    }
}

/// Write `units` to `capture.pcapng` inside a fresh temp dir with
/// `interfaces` analyzer links.
pub fn write_capture(interfaces: u32, units: &[Unit]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("capture.pcapng");
    write_capture_to(&path, interfaces, units);
    (dir, path)
}

pub fn write_capture_to(path: &Path, interfaces: u32, units: &[Unit]) {
    let file = File::create(path).expect("create capture");
    let mut writer = PcapngWriter::new(file, "tlpshark tests").expect("shb");
    for idx in 0..interfaces {
        writer.add_interface(&format!("link{idx}")).expect("idb");
    }
    for (idx, unit) in units.iter().enumerate() {
        let record = CaptureRecordBuilder::new(idx as u32, unit.timestamp_ns)
            .direction(unit.direction)
            .link(1, 2)
            .frame(&unit.frame);
        writer.write_record(unit.interface, &record).expect("epb");
    }
    writer.finish().expect("flush");
}

pub fn mem_read(tag: u8, length_dw: u16) -> Vec<u8> {
    let mut tlp = vec![0x00, 0x00, (length_dw >> 8) as u8 & 0x03, length_dw as u8];
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, 0xFF, 0x00, 0x00, 0x10, 0x00]);
    tlp
}

pub fn mem_write(tag: u8) -> Vec<u8> {
    let mut tlp = vec![0x40, 0x00, 0x00, 0x01];
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, 0x0F, 0x00, 0x00, 0x20, 0x00]);
    tlp.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    tlp
}

pub fn config_read(tag: u8) -> Vec<u8> {
    let mut tlp = vec![0x04, 0x00, 0x00, 0x01];
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, 0x0F, 0x01, 0x00, 0x00, 0x00]);
    tlp
}

/// Completion with data (`length_dw > 0`) or without, status SC unless
/// `status` says otherwise.
pub fn completion(tag: u8, status: u8, byte_count: u16, length_dw: u16, lower_address: u8) -> Vec<u8> {
    let fmt_type = if length_dw > 0 { 0x4A } else { 0x0A };
    let mut tlp = vec![fmt_type, 0x00, (length_dw >> 8) as u8 & 0x03, length_dw as u8];
    tlp.extend_from_slice(&[0x00, 0x00]);
    tlp.extend_from_slice(&[(status << 5) | ((byte_count >> 8) as u8 & 0x0F), byte_count as u8]);
    tlp.extend_from_slice(&REQUESTER_ID.to_be_bytes());
    tlp.extend_from_slice(&[tag, lower_address & 0x7F]);
    for dw in 0..u32::from(length_dw) {
        tlp.extend_from_slice(&dw.to_le_bytes());
    }
    tlp
}
