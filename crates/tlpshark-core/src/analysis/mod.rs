//! Capture-wide analysis: feeds analyzer records through one decode session
//! per link, then folds the sessions into a `Report`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info};

use crate::protocols::common::format_bdf;
use crate::source::pcap::layout::LINKTYPE_PCIE_CAPTURE;
use crate::source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
use crate::{CaptureSummary, DEFAULT_GENERATED_AT, Report, TransactionSummary, make_stub_report};

pub mod compliance;
pub mod session;
pub mod tracker;

use compliance::ComplianceStats;
use session::{DecodeSession, DecodedUnit};
use tracker::TransactionRecord;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Knobs for a single analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Emit every decoded unit in `Report::records`.
    pub include_records: bool,
    /// Examples kept per compliance violation.
    pub max_examples: usize,
    /// Revisit units after the first pass so requests list the completions
    /// that arrived after them.
    pub replay: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_records: false,
            max_examples: 3,
            replay: true,
        }
    }
}

pub fn analyze_pcap_file(path: &Path) -> Result<Report, AnalysisError> {
    analyze_pcap_file_with(path, &AnalysisOptions::default())
}

pub fn analyze_pcap_file_with(
    path: &Path,
    options: &AnalysisOptions,
) -> Result<Report, AnalysisError> {
    let source = PcapFileSource::open(path)?;
    analyze_source_with(path, source, options)
}

pub fn analyze_source<S: PacketSource>(path: &Path, source: S) -> Result<Report, AnalysisError> {
    analyze_source_with(path, source, &AnalysisOptions::default())
}

pub fn analyze_source_with<S: PacketSource>(
    path: &Path,
    mut source: S,
    options: &AnalysisOptions,
) -> Result<Report, AnalysisError> {
    let mut packets_total = 0u64;
    let mut packets_skipped = 0u64;
    let mut first_ts = None;
    let mut last_ts = None;
    let mut sessions: BTreeMap<u32, DecodeSession> = BTreeMap::new();
    let mut compliance = ComplianceStats::new(options.max_examples);
    let mut records = Vec::new();

    while let Some(PacketEvent {
        ts,
        interface,
        linktype,
        data,
    }) = source.next_packet()?
    {
        packets_total += 1;
        update_ts_bounds(&mut first_ts, &mut last_ts, ts);
        if linktype != Some(LINKTYPE_PCIE_CAPTURE) {
            debug!(unit = packets_total, interface, ?linktype, "skipping non-PCIe packet");
            packets_skipped += 1;
            continue;
        }

        let session = sessions
            .entry(interface)
            .or_insert_with(|| DecodeSession::new(interface));
        let unit = session.decode(packets_total, &data);
        compliance.add_unit(&unit);
        if options.include_records {
            records.push(unit);
        }
    }

    if options.replay {
        replay_units(&mut sessions, &mut records);
    }

    let mut report = make_stub_report(&path.display().to_string(), path.metadata()?.len());
    report.capture_summary = Some(CaptureSummary {
        packets_total,
        packets_skipped,
        time_start: ts_to_rfc3339(first_ts),
        time_end: ts_to_rfc3339(last_ts),
    });
    report.generated_at = report
        .capture_summary
        .as_ref()
        .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());

    report.links = sessions.values().map(DecodeSession::summary).collect();
    report.transactions = sessions
        .values()
        .flat_map(|session| {
            session
                .tracker()
                .records()
                .iter()
                .map(|record| build_transaction_summary(session.interface(), record))
        })
        .collect();
    report.compliance = compliance.build_summary();
    if options.include_records {
        report.records = Some(records);
    }

    info!(
        packets = packets_total,
        skipped = packets_skipped,
        links = report.links.len(),
        transactions = report.transactions.len(),
        "analysis complete"
    );
    Ok(report)
}

fn replay_units(sessions: &mut BTreeMap<u32, DecodeSession>, units: &mut [DecodedUnit]) {
    for unit in units {
        if let Some(session) = sessions.get_mut(&unit.interface) {
            session.replay(unit);
        }
    }
}

fn build_transaction_summary(interface: u32, record: &TransactionRecord) -> TransactionSummary {
    let tag = (record.transaction_id >> 16) as u16;
    let requester_id = record.transaction_id as u16;
    TransactionSummary {
        interface,
        request_unit: record.request_unit,
        request: record.request_kind.short_name(),
        transaction_id: format!("{:#010x}", record.transaction_id),
        requester: format_bdf(requester_id),
        tag,
        completion_units: record.completions.iter().map(|entry| entry.unit).collect(),
        first_latency_ns: record.completions.first().map(|entry| {
            let delta = i128::from(entry.timestamp_ns) - i128::from(record.request_timestamp_ns);
            delta.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
        }),
        state: if record.complete {
            "complete".to_string()
        } else {
            "pending".to_string()
        },
    }
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let ts = match ts {
        Some(ts) => ts,
        None => return,
    };
    match first {
        None => *first = Some(ts),
        Some(existing) => {
            if ts < *existing {
                *first = Some(ts);
            }
        }
    }
    match last {
        None => *last = Some(ts),
        Some(existing) => {
            if ts > *existing {
                *last = Some(ts);
            }
        }
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
