use std::collections::BTreeMap;

use crate::protocols::warning::Warning;
use crate::{ComplianceSummary, Violation};

use super::session::DecodedUnit;
use super::tracker::TransactionLink;

pub(crate) const DECODE_ID: &str = "PCIE-DECODE";
pub(crate) const ORPHAN_ID: &str = "PCIE-ORPHAN-CPL";

#[derive(Debug)]
struct ViolationStats {
    severity: &'static str,
    message: &'static str,
    count: u64,
    examples: Vec<String>,
}

/// Folds per-unit warnings into violation counts.
#[derive(Debug)]
pub(crate) struct ComplianceStats {
    max_examples: usize,
    units: u64,
    clean_units: u64,
    violations: BTreeMap<&'static str, ViolationStats>,
}

impl ComplianceStats {
    pub fn new(max_examples: usize) -> Self {
        Self {
            max_examples,
            units: 0,
            clean_units: 0,
            violations: BTreeMap::new(),
        }
    }

    pub fn add_unit(&mut self, unit: &DecodedUnit) {
        self.units += 1;
        let mut clean = true;
        let context = unit_context(unit);

        if let Some(error) = &unit.error {
            clean = false;
            self.add(
                DECODE_ID,
                "error",
                "Capture unit could not be decoded",
                format!("{context}: {error}"),
            );
        }
        for warning in &unit.warnings {
            clean = false;
            self.add_warning(warning, &context);
        }
        if unit.link == TransactionLink::Orphan {
            clean = false;
            self.add(
                ORPHAN_ID,
                "warning",
                "Completion without an outstanding request",
                context,
            );
        }
        if clean {
            self.clean_units += 1;
        }
    }

    fn add_warning(&mut self, warning: &Warning, context: &str) {
        self.add(
            warning.id(),
            warning.severity(),
            warning.title(),
            format!("{context}: {}", warning.message()),
        );
    }

    fn add(&mut self, id: &'static str, severity: &'static str, message: &'static str, example: String) {
        let entry = self.violations.entry(id).or_insert_with(|| ViolationStats {
            severity,
            message,
            count: 0,
            examples: Vec::new(),
        });
        entry.count += 1;
        if entry.examples.len() < self.max_examples {
            entry.examples.push(example);
        }
    }

    pub fn build_summary(self) -> Vec<ComplianceSummary> {
        if self.units == 0 {
            return Vec::new();
        }
        let mut violations: Vec<Violation> = self
            .violations
            .into_iter()
            .map(|(id, stats)| Violation {
                id: id.to_string(),
                severity: stats.severity.to_string(),
                message: stats.message.to_string(),
                count: stats.count,
                examples: stats.examples,
            })
            .collect();
        violations.sort_by(|a, b| {
            severity_rank(&a.severity)
                .cmp(&severity_rank(&b.severity))
                .then_with(|| a.id.cmp(&b.id))
        });
        vec![ComplianceSummary {
            protocol: "pcie".to_string(),
            compliance_percentage: self.clean_units as f64 * 100.0 / self.units as f64,
            violations,
        }]
    }
}

fn severity_rank(severity: &str) -> u8 {
    match severity {
        "error" => 0,
        _ => 1,
    }
}

fn unit_context(unit: &DecodedUnit) -> String {
    let mut context = format!("unit {} (if {})", unit.unit, unit.interface);
    if let Some(direction) = unit.direction {
        context.push(' ');
        context.push_str(direction.name());
    }
    if let Some(ts) = unit.timestamp_ns {
        context.push_str(&format!(" @ {ts} ns"));
    }
    context
}
