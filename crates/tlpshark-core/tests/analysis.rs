mod common;

use tlpshark_core::protocols::frame::encode::{sdp_frame, stp_frame};
use tlpshark_core::{
    AnalysisOptions, DecodedUnit, TransactionLink, analyze_pcap_file, analyze_pcap_file_with,
};

use common::{Unit, completion, config_read, mem_read, mem_write, write_capture};

fn with_records() -> AnalysisOptions {
    AnalysisOptions {
        include_records: true,
        ..AnalysisOptions::default()
    }
}

fn unit(records: &[DecodedUnit], number: u64) -> &DecodedUnit {
    records
        .iter()
        .find(|record| record.unit == number)
        .expect("unit present")
}

#[test]
fn split_completions_are_matched_to_their_read() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(1_000, stp_frame(1, &mem_read(0x05, 32))),
            Unit::up(1_100, sdp_frame(0x00, [0x00, 0x00, 0x01])),
            Unit::up(1_600, stp_frame(7, &completion(0x05, 0, 128, 16, 0x00))),
            Unit::up(1_900, stp_frame(8, &completion(0x05, 0, 64, 16, 0x40))),
        ],
    );
    let report = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let records = report.records.as_deref().expect("records");

    // The replay pass fills in completions that followed the request.
    let TransactionLink::Request { completions } = &unit(records, 1).link else {
        panic!("expected request link");
    };
    let units: Vec<u64> = completions.iter().map(|c| c.unit).collect();
    assert_eq!(units, vec![3, 4]);
    assert_eq!(completions[0].latency_ns, 600);

    assert_eq!(
        unit(records, 3).link,
        TransactionLink::Completion {
            request_unit: 1,
            latency_ns: 600,
            additional_completions: vec![4],
        }
    );
    assert_eq!(unit(records, 2).summary, "DLLP Ack");
    assert_eq!(unit(records, 2).link, TransactionLink::Untracked);

    assert_eq!(report.transactions.len(), 1);
    let transaction = &report.transactions[0];
    assert_eq!(transaction.request, "MRd");
    assert_eq!(transaction.requester, "01:00.0");
    assert_eq!(transaction.tag, 5);
    assert_eq!(transaction.completion_units, vec![3, 4]);
    assert_eq!(transaction.first_latency_ns, Some(600));
    assert_eq!(transaction.state, "complete");

    let link = &report.links[0];
    assert_eq!(link.units, 4);
    assert_eq!(link.frames.get("tlp"), Some(&3));
    assert_eq!(link.frames.get("dllp"), Some(&1));
    assert_eq!(link.tlp_kinds.get("CplD"), Some(&2));
    assert_eq!(link.dllp_kinds.get("Ack"), Some(&1));
    assert_eq!(link.transactions_pending, 0);

    let compliance = &report.compliance[0];
    assert!(compliance.violations.is_empty());
    assert_eq!(compliance.compliance_percentage, 100.0);
}

#[test]
fn completion_after_the_final_split_is_an_orphan() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(1_000, stp_frame(1, &mem_read(0x05, 32))),
            Unit::up(1_600, stp_frame(7, &completion(0x05, 0, 128, 16, 0x00))),
            Unit::up(1_900, stp_frame(8, &completion(0x05, 0, 64, 16, 0x40))),
            Unit::up(2_200, stp_frame(9, &completion(0x05, 0, 64, 16, 0x40))),
        ],
    );
    let report = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let records = report.records.as_deref().expect("records");

    assert_eq!(unit(records, 4).link, TransactionLink::Orphan);
    let TransactionLink::Request { completions } = &unit(records, 1).link else {
        panic!("expected request link");
    };
    let units: Vec<u64> = completions.iter().map(|c| c.unit).collect();
    assert_eq!(units, vec![2, 3]);
    assert_eq!(report.transactions[0].completion_units, vec![2, 3]);

    let violations = &report.compliance[0].violations;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].id, "PCIE-ORPHAN-CPL");
    assert_eq!(violations[0].count, 1);
}

#[test]
fn config_read_retires_after_one_completion() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(0, stp_frame(1, &config_read(0x01))),
            Unit::up(100, stp_frame(2, &completion(0x01, 0, 4, 1, 0x00))),
            Unit::up(200, stp_frame(3, &completion(0x01, 0, 4, 1, 0x00))),
        ],
    );
    let report = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let records = report.records.as_deref().unwrap();

    assert!(matches!(
        unit(records, 2).link,
        TransactionLink::Completion { request_unit: 1, .. }
    ));
    assert_eq!(unit(records, 3).link, TransactionLink::Orphan);

    let violation = report.compliance[0]
        .violations
        .iter()
        .find(|v| v.id == "PCIE-ORPHAN-CPL")
        .expect("orphan violation");
    assert_eq!(violation.count, 1);
    assert!(violation.examples[0].starts_with("unit 3 (if 0) upstream"));
}

#[test]
fn pending_and_posted_requests() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(0, stp_frame(1, &mem_write(0x02))),
            Unit::down(10, stp_frame(2, &mem_read(0x03, 4))),
        ],
    );
    let report = analyze_pcap_file(&path).unwrap();
    assert!(report.records.is_none());
    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.transactions[0].state, "pending");
    assert_eq!(report.transactions[0].first_latency_ns, None);
    assert_eq!(report.links[0].transactions_pending, 1);
    assert_eq!(report.links[0].tlp_kinds.get("MWr"), Some(&1));
}

#[test]
fn integrity_problems_become_violations() {
    let mut corrupted = stp_frame(1, &mem_read(0x06, 1));
    let lcrc_byte = corrupted.len() - 2;
    corrupted[lcrc_byte] ^= 0x01;
    let mut bad_dllp = sdp_frame(0x00, [0x00, 0x00, 0x05]);
    bad_dllp[5] ^= 0xFF;

    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(0, corrupted),
            Unit::up(10, bad_dllp),
            Unit::up(20, stp_frame(2, &completion(0x07, 0b001, 4, 0, 0x00))),
            // STP claiming a 1024-DW write with nothing behind the header.
            Unit::down(30, vec![0xFB, 0x00, 0x03, 0x40, 0x00, 0x00, 0x00]),
            Unit::down(40, sdp_frame(0x00, [0x00, 0x00, 0x06])),
        ],
    );
    let report = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let records = report.records.as_deref().unwrap();

    assert_eq!(unit(records, 1).integrity.lcrc_valid, Some(false));
    assert_eq!(unit(records, 2).integrity.dllp_crc_valid, Some(false));
    assert!(unit(records, 4).error.is_some());
    assert!(unit(records, 5).integrity.all_valid());

    let ids: Vec<&str> = report.compliance[0]
        .violations
        .iter()
        .map(|v| v.id.as_str())
        .collect();
    for id in [
        "PCIE-LCRC",
        "PCIE-DLLP-CRC",
        "PCIE-DECODE",
        "PCIE-CPL-STATUS",
        "PCIE-ORPHAN-CPL",
    ] {
        assert!(ids.contains(&id), "missing {id} in {ids:?}");
    }
    // Errors sort before warnings.
    assert_eq!(report.compliance[0].violations[0].severity, "error");
    assert!((report.compliance[0].compliance_percentage - 20.0).abs() < 1e-9);
    assert_eq!(report.links[0].decode_errors, 1);
}

#[test]
fn links_are_tracked_separately() {
    // The completion arrives on another interface, so it cannot match.
    let (_dir, path) = write_capture(
        2,
        &[
            Unit::down(0, stp_frame(1, &mem_read(0x08, 1))),
            Unit::up(50, stp_frame(2, &completion(0x08, 0, 4, 1, 0x00))).on(1),
        ],
    );
    let report = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let records = report.records.as_deref().unwrap();
    assert_eq!(unit(records, 2).link, TransactionLink::Orphan);
    assert_eq!(report.links.len(), 2);
    assert_eq!(report.links[1].interface, 1);
}

#[test]
fn analysis_is_deterministic_and_replay_is_idempotent() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(0, stp_frame(1, &mem_read(0x05, 2))),
            Unit::up(10, stp_frame(2, &completion(0x05, 0, 8, 1, 0x00))),
            Unit::up(20, stp_frame(3, &completion(0x05, 0, 4, 1, 0x04))),
        ],
    );
    let first = analyze_pcap_file_with(&path, &with_records()).unwrap();
    let second = analyze_pcap_file_with(&path, &with_records()).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    // Without replay the request only knows what it saw during the first pass.
    let no_replay = AnalysisOptions {
        replay: false,
        ..with_records()
    };
    let report = analyze_pcap_file_with(&path, &no_replay).unwrap();
    let records = report.records.as_deref().unwrap();
    assert_eq!(
        unit(records, 1).link,
        TransactionLink::Request {
            completions: Vec::new()
        }
    );
    assert_eq!(
        serde_json::to_value(&report.transactions).unwrap(),
        serde_json::to_value(&first.transactions).unwrap()
    );
}

#[test]
fn timestamps_and_counts_land_in_capture_summary() {
    let (_dir, path) = write_capture(
        1,
        &[
            Unit::down(1_000_000_000, sdp_frame(0x00, [0x00, 0x00, 0x01])),
            Unit::down(2_500_000_000, sdp_frame(0x00, [0x00, 0x00, 0x02])),
        ],
    );
    let report = analyze_pcap_file(&path).unwrap();
    let summary = report.capture_summary.unwrap();
    assert_eq!(summary.packets_total, 2);
    assert_eq!(summary.packets_skipped, 0);
    assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:00:01Z"));
    assert_eq!(summary.time_end.as_deref(), Some("1970-01-01T00:00:02.5Z"));
    assert_eq!(report.generated_at, "1970-01-01T00:00:02.5Z");
}
