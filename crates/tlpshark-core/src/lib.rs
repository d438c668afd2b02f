//! tlpshark core library for offline analysis of PCI Express captures.
//!
//! Agilent protocol analyzer records (as exported to pcapng with link type
//! USER11) flow through a fixed pipeline: packet sources yield records, the
//! capture adapter splits off the record header, the frame decoder follows
//! the 8b/10b start symbol into DLLP, TLP or ordered-set decoders, and the
//! analysis layer correlates requests with completions and aggregates a
//! deterministic report.
//!
//! Decoders in `protocols` are pure and never panic on malformed input:
//! structural problems surface as per-layer errors, integrity problems
//! (CRC mismatches, reserved bits, bad end tags) as warnings attached to the
//! decoded value. All I/O stays in `source`.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use tlpshark_core::analyze_pcap_file;
//!
//! let report = analyze_pcap_file(Path::new("capture.pcapng"))?;
//! println!("report version: {}", report.report_version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod protocols;
pub mod source;

pub use analysis::session::{DecodeSession, DecodedUnit};
pub use analysis::tracker::{ReplayMode, TransactionLink, TransactionTracker};
pub use analysis::{
    AnalysisError, AnalysisOptions, analyze_pcap_file, analyze_pcap_file_with, analyze_source,
    analyze_source_with,
};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Aggregated analysis report with deterministic ordering.
///
/// # Examples
/// ```
/// use tlpshark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, tlpshark_core::REPORT_VERSION);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp representing the report generation time.
    pub generated_at: String,

    /// Input capture metadata.
    pub input: InputInfo,

    /// Optional capture summary (may be empty when unavailable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Per-link summaries ordered by interface.
    pub links: Vec<LinkSummary>,
    /// Transactions ordered by interface, then request order.
    pub transactions: Vec<TransactionSummary>,
    /// Protocol compliance summaries in stable order.
    pub compliance: Vec<ComplianceSummary>,
    /// Every decoded unit, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<DecodedUnit>>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use tlpshark_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "tlpshark".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "tlpshark");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name (e.g., "tlpshark").
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// Input capture metadata embedded in reports.
///
/// # Examples
/// ```
/// use tlpshark_core::InputInfo;
///
/// let input = InputInfo {
///     path: "capture.pcapng".to_string(),
///     bytes: 1024,
/// };
/// assert_eq!(input.bytes, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Basic capture summary (timestamps may be absent).
///
/// # Examples
/// ```
/// use tlpshark_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     packets_total: 10,
///     packets_skipped: 0,
///     time_start: None,
///     time_end: None,
/// };
/// assert_eq!(summary.packets_total, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Total packet count observed in the capture.
    pub packets_total: u64,
    /// Packets on interfaces that do not carry analyzer records.
    pub packets_skipped: u64,
    /// RFC3339 timestamp of the first packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Per-link (capture interface) decode statistics.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
///
/// use tlpshark_core::LinkSummary;
///
/// let link = LinkSummary {
///     interface: 0,
///     units: 2,
///     decode_errors: 0,
///     link_speed: Some("2.5 GT/s".to_string()),
///     lanes: Some(4),
///     frames: BTreeMap::from([("tlp".to_string(), 2)]),
///     directions: BTreeMap::new(),
///     dllp_kinds: BTreeMap::new(),
///     tlp_kinds: BTreeMap::new(),
///     ordered_sets: BTreeMap::new(),
///     transactions: 1,
///     transactions_pending: 0,
/// };
/// assert_eq!(link.frames["tlp"], 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    /// Capture interface the link was recorded on.
    pub interface: u32,
    /// Analyzer records seen on this link.
    pub units: u64,
    /// Records whose header or frame could not be decoded.
    pub decode_errors: u64,
    /// Last link speed reported in the record flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_speed: Option<String>,
    /// Last link width reported in the record flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lanes: Option<u8>,
    /// Frame counts by kind (`tlp`, `dllp`, `ordered_set`, `unknown`).
    pub frames: BTreeMap<String, u64>,
    /// Record counts by direction.
    pub directions: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dllp_kinds: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tlp_kinds: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ordered_sets: BTreeMap<String, u64>,
    /// Non-posted requests seen.
    pub transactions: u64,
    /// Requests still waiting for a final completion at end of capture.
    pub transactions_pending: u64,
}

/// One non-posted request and the completions matched to it.
///
/// # Examples
/// ```
/// use tlpshark_core::TransactionSummary;
///
/// let transaction = TransactionSummary {
///     interface: 0,
///     request_unit: 1,
///     request: "MRd".to_string(),
///     transaction_id: "0x00050100".to_string(),
///     requester: "01:00.0".to_string(),
///     tag: 5,
///     completion_units: vec![2],
///     first_latency_ns: Some(800),
///     state: "complete".to_string(),
/// };
/// assert_eq!(transaction.completion_units, vec![2]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub interface: u32,
    /// Unit id of the request.
    pub request_unit: u64,
    /// Request kind short name (e.g., "MRd", "CfgRd0").
    pub request: String,
    /// `(tag << 16) | requester_id` in hex.
    pub transaction_id: String,
    /// Requester as `bus:device.function`.
    pub requester: String,
    pub tag: u16,
    /// Completion unit ids in capture order.
    pub completion_units: Vec<u64>,
    /// Latency of the first completion in nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_latency_ns: Option<i64>,
    /// `complete` or `pending`.
    pub state: String,
}

/// Compliance summary for a protocol.
///
/// # Examples
/// ```
/// use tlpshark_core::{ComplianceSummary, Violation};
///
/// let summary = ComplianceSummary {
///     protocol: "pcie".to_string(),
///     compliance_percentage: 50.0,
///     violations: vec![Violation {
///         id: "PCIE-LCRC".to_string(),
///         severity: "error".to_string(),
///         message: "TLP LCRC mismatch".to_string(),
///         count: 1,
///         examples: Vec::new(),
///     }],
/// };
/// assert_eq!(summary.violations.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Protocol name (currently always "pcie").
    pub protocol: String,
    /// Share of units without any violation (0.0–100.0).
    pub compliance_percentage: f64,
    /// Violations sorted by severity and ID.
    pub violations: Vec<Violation>,
}

/// Single compliance violation record.
///
/// # Examples
/// ```
/// use tlpshark_core::Violation;
///
/// let violation = Violation {
///     id: "PCIE-DECODE".to_string(),
///     severity: "error".to_string(),
///     message: "Capture unit could not be decoded".to_string(),
///     count: 1,
///     examples: vec!["unit 4 (if 0) upstream @ 1200 ns: too short".to_string()],
/// };
/// assert_eq!(violation.count, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Stable violation identifier (e.g., `PCIE-DLLP-CRC`).
    pub id: String,
    /// Severity label (`error` or `warning`).
    pub severity: String,
    /// Human-readable message explaining the violation.
    pub message: String,
    /// Number of occurrences aggregated into this violation.
    pub count: u64,
    /// Up to `max_examples` contexts, formatted as `unit N (if I) direction @ ts: detail`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// Build a stub report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use tlpshark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, tlpshark_core::REPORT_VERSION);
/// assert!(report.links.is_empty());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "tlpshark".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        links: vec![],
        transactions: vec![],
        compliance: vec![],
        records: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_optional_fields_when_none() {
        let mut report = make_stub_report("capture.pcapng", 1);
        report.capture_summary = Some(CaptureSummary {
            packets_total: 1,
            packets_skipped: 0,
            time_start: None,
            time_end: None,
        });
        report.links.push(LinkSummary {
            interface: 0,
            units: 1,
            decode_errors: 0,
            link_speed: None,
            lanes: None,
            frames: BTreeMap::from([("dllp".to_string(), 1)]),
            directions: BTreeMap::from([("downstream".to_string(), 1)]),
            dllp_kinds: BTreeMap::from([("Ack".to_string(), 1)]),
            tlp_kinds: BTreeMap::new(),
            ordered_sets: BTreeMap::new(),
            transactions: 0,
            transactions_pending: 0,
        });
        report.transactions.push(TransactionSummary {
            interface: 0,
            request_unit: 1,
            request: "MRd".to_string(),
            transaction_id: "0x00050100".to_string(),
            requester: "01:00.0".to_string(),
            tag: 5,
            completion_units: Vec::new(),
            first_latency_ns: None,
            state: "pending".to_string(),
        });

        let value = serde_json::to_value(&report).expect("report json");
        assert!(value.get("records").is_none());
        let capture = value.get("capture_summary").expect("capture_summary");
        assert!(capture.get("time_start").is_none());
        assert!(capture.get("time_end").is_none());

        let link = &value["links"][0];
        assert!(link.get("link_speed").is_none());
        assert!(link.get("tlp_kinds").is_none());
        assert_eq!(link["dllp_kinds"]["Ack"], 1);

        let transaction = &value["transactions"][0];
        assert!(transaction.get("first_latency_ns").is_none());
        assert_eq!(transaction["state"], "pending");
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = make_stub_report("capture.pcapng", 7);
        let json = serde_json::to_string(&report).expect("serialize");
        let parsed: Report = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.input.bytes, 7);
        assert_eq!(parsed.tool.name, "tlpshark");
        assert!(parsed.records.is_none());
    }
}
