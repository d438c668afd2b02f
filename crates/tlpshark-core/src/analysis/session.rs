use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LinkSummary;
use crate::protocols::capture::{CaptureRecord, Direction, decode_capture_record};
use crate::protocols::frame::{Frame, IntegrityChecks, decode_frame};
use crate::protocols::warning::Warning;

use super::tracker::{ReplayMode, TransactionLink, TransactionTracker};

/// Everything decoded from one capture unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedUnit {
    /// 1-based position of the packet in the capture.
    pub unit: u64,
    pub interface: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<Frame>,
    /// Why the unit could not be decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub integrity: IntegrityChecks,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    pub link: TransactionLink,
}

impl DecodedUnit {
    fn failed(unit: u64, interface: u32, error: String) -> Self {
        Self {
            unit,
            interface,
            record: None,
            timestamp_ns: None,
            direction: None,
            summary: "Malformed".to_string(),
            frame: None,
            error: Some(error),
            integrity: IntegrityChecks {
                reserved_bits_zero: true,
                ..IntegrityChecks::default()
            },
            warnings: Vec::new(),
            link: TransactionLink::Untracked,
        }
    }
}

#[derive(Debug, Default)]
struct LinkStats {
    units: u64,
    decode_errors: u64,
    frames: BTreeMap<String, u64>,
    directions: BTreeMap<String, u64>,
    dllp_kinds: BTreeMap<String, u64>,
    tlp_kinds: BTreeMap<String, u64>,
    ordered_sets: BTreeMap<String, u64>,
    link_speed: Option<&'static str>,
    lanes: Option<u8>,
}

impl LinkStats {
    fn add_record(&mut self, record: &CaptureRecord<'_>) {
        *self
            .directions
            .entry(record.direction().name().to_string())
            .or_default() += 1;
        let flags = &record.header.flags;
        if let Some(speed) = flags.link_speed_name() {
            self.link_speed = Some(speed);
        }
        if let Some(lanes) = flags.lanes() {
            self.lanes = Some(lanes);
        }
    }

    fn add_frame(&mut self, frame: &Frame) {
        *self.frames.entry(frame.kind_name().to_string()).or_default() += 1;
        let (histogram, name) = match frame {
            Frame::Tlp(tlp) => (&mut self.tlp_kinds, tlp.tlp.name()),
            Frame::Dllp(dllp) => (&mut self.dllp_kinds, dllp.dllp.kind.name()),
            Frame::OrderedSet(set) => (&mut self.ordered_sets, set.name().to_string()),
            Frame::Unknown { .. } => return,
        };
        *histogram.entry(name).or_default() += 1;
    }
}

/// Decode state of one link (one capture interface). Both directions share
/// the session so completions meet their requests.
#[derive(Debug)]
pub struct DecodeSession {
    interface: u32,
    tracker: TransactionTracker,
    stats: LinkStats,
}

impl DecodeSession {
    pub fn new(interface: u32) -> Self {
        Self {
            interface,
            tracker: TransactionTracker::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn interface(&self) -> u32 {
        self.interface
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    /// First-pass decode of one analyzer record.
    ///
    /// Never fails: a record or frame that cannot be decoded yields a unit
    /// carrying the error, and the traversal moves on.
    pub fn decode(&mut self, unit: u64, bytes: &[u8]) -> DecodedUnit {
        self.stats.units += 1;
        let record = match decode_capture_record(bytes) {
            Ok(record) => record,
            Err(err) => {
                debug!(unit, interface = self.interface, %err, "capture record rejected");
                self.stats.decode_errors += 1;
                return DecodedUnit::failed(unit, self.interface, err.to_string());
            }
        };
        self.stats.add_record(&record);

        let timestamp_ns = record.timestamp_ns();
        let mut decoded = DecodedUnit::failed(unit, self.interface, String::new());
        decoded.record = Some(record.header.record);
        decoded.timestamp_ns = Some(timestamp_ns);
        decoded.direction = Some(record.direction());
        decoded.warnings = record.warnings();

        match decode_frame(record.frame) {
            Ok(frame) => {
                self.stats.add_frame(&frame);
                decoded.summary = frame.summary();
                decoded.integrity = frame.integrity();
                decoded.warnings.extend(frame.warnings());
                decoded.link = match &frame {
                    Frame::Tlp(tlp) if !tlp.nullified => {
                        self.tracker
                            .observe(unit, timestamp_ns, &tlp.tlp, ReplayMode::FirstPass)
                    }
                    _ => TransactionLink::Untracked,
                };
                decoded.error = None;
                decoded.frame = Some(frame);
            }
            Err(err) => {
                debug!(unit, interface = self.interface, %err, "frame decode failed");
                self.stats.decode_errors += 1;
                decoded.error = Some(err.to_string());
            }
        }
        decoded
    }

    /// Refresh a unit's transaction link from the completed first pass.
    pub fn replay(&mut self, decoded: &mut DecodedUnit) {
        let Some(Frame::Tlp(frame)) = &decoded.frame else {
            return;
        };
        if frame.nullified {
            return;
        }
        decoded.link = self.tracker.observe(
            decoded.unit,
            decoded.timestamp_ns.unwrap_or_default(),
            &frame.tlp,
            ReplayMode::Replay,
        );
    }

    pub fn summary(&self) -> LinkSummary {
        let stats = &self.stats;
        LinkSummary {
            interface: self.interface,
            units: stats.units,
            decode_errors: stats.decode_errors,
            link_speed: stats.link_speed.map(str::to_string),
            lanes: stats.lanes,
            frames: stats.frames.clone(),
            directions: stats.directions.clone(),
            dllp_kinds: stats.dllp_kinds.clone(),
            tlp_kinds: stats.tlp_kinds.clone(),
            ordered_sets: stats.ordered_sets.clone(),
            transactions: self.tracker.records().len() as u64,
            transactions_pending: self
                .tracker
                .records()
                .iter()
                .filter(|record| !record.complete)
                .count() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::crc::lcrc32;
    use crate::source::pcap::CaptureRecordBuilder;

    fn record(number: u32, timestamp_ns: u64, direction: Direction, frame: &[u8]) -> Vec<u8> {
        CaptureRecordBuilder::new(number, timestamp_ns)
            .direction(direction)
            .link(1, 2)
            .frame(frame)
            .build()
            .unwrap()
    }

    fn stp(sequence: u16, tlp: &[u8], end: u8) -> Vec<u8> {
        let mut frame = vec![0xFB];
        frame.extend_from_slice(&sequence.to_be_bytes());
        frame.extend_from_slice(tlp);
        let lcrc = lcrc32(&frame[1..]);
        frame.extend_from_slice(&lcrc.to_le_bytes());
        frame.push(end);
        frame
    }

    const MRD: [u8; 12] = [
        0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x05, 0x0F, 0x00, 0x00, 0x10, 0x00,
    ];
    const CPLD: [u8; 16] = [
        0x4A, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x00, 0x05, 0x00, 0xEF, 0xBE,
        0xAD, 0xDE,
    ];

    #[test]
    fn request_and_completion_are_linked() {
        let mut session = DecodeSession::new(0);
        let request = session.decode(1, &record(1, 1_000, Direction::Downstream, &stp(1, &MRD, 0xFD)));
        let mut completion =
            session.decode(2, &record(2, 1_800, Direction::Upstream, &stp(9, &CPLD, 0xFD)));

        assert_eq!(request.summary, "TLP MRd");
        assert!(request.integrity.all_valid());
        assert_eq!(
            completion.link,
            TransactionLink::Completion {
                request_unit: 1,
                latency_ns: 800,
                additional_completions: Vec::new(),
            }
        );

        let mut request = request;
        session.replay(&mut request);
        assert!(matches!(
            &request.link,
            TransactionLink::Request { completions } if completions.len() == 1
        ));
        session.replay(&mut completion);
        assert!(matches!(completion.link, TransactionLink::Completion { .. }));

        let summary = session.summary();
        assert_eq!(summary.units, 2);
        assert_eq!(summary.frames.get("tlp"), Some(&2));
        assert_eq!(summary.directions.get("upstream"), Some(&1));
        assert_eq!(summary.link_speed.as_deref(), Some("2.5 GT/s"));
        assert_eq!(summary.lanes, Some(4));
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.transactions_pending, 0);
    }

    #[test]
    fn nullified_tlp_is_not_tracked() {
        let mut session = DecodeSession::new(0);
        let unit = session.decode(1, &record(1, 0, Direction::Downstream, &stp(1, &MRD, 0xFE)));
        assert_eq!(unit.link, TransactionLink::Untracked);
        assert!(session.tracker().records().is_empty());
    }

    #[test]
    fn malformed_units_keep_the_traversal_going() {
        let mut session = DecodeSession::new(3);
        let short = session.decode(1, &[0u8; 10]);
        assert!(short.error.is_some());
        assert_eq!(short.interface, 3);

        // STP announcing a 1024-DW write with only the header present.
        let truncated = record(2, 0, Direction::Downstream, &[0xFB, 0x00, 0x01, 0x40, 0x00, 0x00, 0x00]);
        let unit = session.decode(2, &truncated);
        assert!(unit.error.is_some());
        assert!(unit.frame.is_none());
        assert_eq!(unit.record, Some(2));

        let ok = session.decode(3, &record(3, 0, Direction::Downstream, &[0xBC, 0x1C, 0x1C, 0x1C]));
        assert!(ok.error.is_none());
        assert_eq!(ok.summary, "SKP Ordered Set");
        assert_eq!(session.summary().decode_errors, 2);
    }
}
