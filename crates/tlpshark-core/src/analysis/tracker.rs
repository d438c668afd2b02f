//! Request/completion correlation for one link.
//!
//! Requests are keyed by their transaction ID (`(tag << 16) | requester_id`).
//! The first pass builds the records and retires an ID once its request is
//! satisfied, so a later reuse of the same tag starts a new record. Every
//! unit that took part in a transaction is also indexed by its unit id, which
//! is all the replay pass consults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocols::tlp::{Tlp, TlpBody, TlpKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Units arrive in capture order and may create or extend records.
    FirstPass,
    /// Units are revisited; the tracker is read-only.
    Replay,
}

/// A completion as seen from its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRef {
    pub unit: u64,
    pub latency_ns: i64,
}

/// How a unit relates to other units of the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "link", rename_all = "snake_case")]
pub enum TransactionLink {
    /// Posted, unrecognised or not a TLP at all.
    Untracked,
    Request {
        completions: Vec<CompletionRef>,
    },
    Completion {
        request_unit: u64,
        /// Completion time minus request time.
        latency_ns: i64,
        /// Other completions of the same request, in capture order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        additional_completions: Vec<u64>,
    },
    /// Completion with no outstanding request.
    Orphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub unit: u64,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: u32,
    pub request_unit: u64,
    pub request_kind: TlpKind,
    pub request_timestamp_ns: u64,
    pub completions: Vec<CompletionEntry>,
    /// DWs the first completion announced (`Byte Count` plus the lower
    /// address offset, rounded up).
    pub expected_dw: Option<u32>,
    pub received_dw: u32,
    /// Set when the ID was retired by a final completion.
    pub complete: bool,
}

impl TransactionRecord {
    fn completion_link(&self, unit: u64) -> TransactionLink {
        let timestamp_ns = self
            .completions
            .iter()
            .find(|entry| entry.unit == unit)
            .map_or(self.request_timestamp_ns, |entry| entry.timestamp_ns);
        TransactionLink::Completion {
            request_unit: self.request_unit,
            latency_ns: signed_delta(timestamp_ns, self.request_timestamp_ns),
            additional_completions: self
                .completions
                .iter()
                .map(|entry| entry.unit)
                .filter(|other| *other != unit)
                .collect(),
        }
    }

    fn request_link(&self) -> TransactionLink {
        TransactionLink::Request {
            completions: self
                .completions
                .iter()
                .map(|entry| CompletionRef {
                    unit: entry.unit,
                    latency_ns: signed_delta(entry.timestamp_ns, self.request_timestamp_ns),
                })
                .collect(),
        }
    }
}

fn signed_delta(later: u64, earlier: u64) -> i64 {
    let delta = i128::from(later) - i128::from(earlier);
    delta.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// DWs still owed by the completer when this completion was sent.
fn remaining_dw(lower_address: u8, byte_count: u16) -> u32 {
    (u32::from(lower_address & 0x3) + u32::from(byte_count) + 3) / 4
}

#[derive(Debug, Default)]
pub struct TransactionTracker {
    by_txid: HashMap<u32, usize>,
    by_unit: HashMap<u64, usize>,
    records: Vec<TransactionRecord>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlate one TLP. In `Replay` the tracker is not modified and the
    /// answer reflects everything learnt during the first pass.
    pub fn observe(
        &mut self,
        unit: u64,
        timestamp_ns: u64,
        tlp: &Tlp,
        mode: ReplayMode,
    ) -> TransactionLink {
        match mode {
            ReplayMode::FirstPass => self.observe_first_pass(unit, timestamp_ns, tlp),
            ReplayMode::Replay => self.lookup(unit, tlp),
        }
    }

    /// Read-only resolution through the unit index.
    pub fn lookup(&self, unit: u64, tlp: &Tlp) -> TransactionLink {
        match self.by_unit.get(&unit).and_then(|idx| self.records.get(*idx)) {
            Some(record) if record.request_unit == unit => record.request_link(),
            Some(record) => record.completion_link(unit),
            None if tlp.kind.is_completion() => TransactionLink::Orphan,
            None => TransactionLink::Untracked,
        }
    }

    fn observe_first_pass(&mut self, unit: u64, timestamp_ns: u64, tlp: &Tlp) -> TransactionLink {
        let Some(txid) = tlp.transaction_id else {
            return TransactionLink::Untracked;
        };

        if let TlpBody::Completion {
            status,
            byte_count,
            lower_address,
            ..
        } = tlp.body
        {
            let Some(&idx) = self.by_txid.get(&txid) else {
                debug!(unit, txid = format_args!("{txid:#010x}"), "orphan completion");
                return TransactionLink::Orphan;
            };
            let Some(record) = self.records.get_mut(idx) else {
                return TransactionLink::Orphan;
            };

            let remaining = remaining_dw(lower_address, byte_count);
            let expected = *record.expected_dw.get_or_insert(remaining);
            record.received_dw += tlp.length_dw;
            record.completions.push(CompletionEntry { unit, timestamp_ns });
            self.by_unit.insert(unit, idx);

            let retire = record.request_kind.is_config_request()
                || !status.is_successful()
                || tlp.length_dw >= remaining
                || record.received_dw >= expected;
            if retire {
                record.complete = true;
                self.by_txid.remove(&txid);
                debug!(
                    unit,
                    txid = format_args!("{txid:#010x}"),
                    completions = record.completions.len(),
                    "transaction retired"
                );
            }
            return record.completion_link(unit);
        }

        if !tlp.kind.is_non_posted_request() {
            return TransactionLink::Untracked;
        }

        let idx = self.records.len();
        self.records.push(TransactionRecord {
            transaction_id: txid,
            request_unit: unit,
            request_kind: tlp.kind,
            request_timestamp_ns: timestamp_ns,
            completions: Vec::new(),
            expected_dw: None,
            received_dw: 0,
            complete: false,
        });
        if self.by_txid.insert(txid, idx).is_some() {
            debug!(unit, txid = format_args!("{txid:#010x}"), "transaction id reused");
        }
        self.by_unit.insert(unit, idx);
        TransactionLink::Request {
            completions: Vec::new(),
        }
    }

    /// All records in request order, including ones still pending.
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// IDs waiting for (more) completions.
    pub fn pending(&self) -> usize {
        self.by_txid.len()
    }
}
