use std::collections::BTreeMap;

use crate::domain::IssueSeverity;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::signatures::RegistryEntry;
use crate::store::EventStore;

use super::{evidence, Detector};

/// Catch-all scan of every record against the externally supplied error-code
/// registry. Catches faults no dedicated detector knows about yet.
pub struct RegistryScanDetector {
    registry: Vec<RegistryEntry>,
}

impl RegistryScanDetector {
    pub fn new(registry: Vec<RegistryEntry>) -> Self {
        Self { registry }
    }
}

impl Detector for RegistryScanDetector {
    fn name(&self) -> &'static str {
        "registry_scan"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        if self.registry.is_empty() {
            sink.set_int("registry_match_count", 0);
            return Ok(());
        }

        // Keyed by registry index so one issue aggregates all hits of a code.
        let mut hits: BTreeMap<usize, Vec<&crate::domain::LogRecord>> = BTreeMap::new();
        let mut total = 0i64;

        for rec in store.records() {
            let matched = self.registry.iter().position(|e| {
                (!e.code.is_empty() && rec.message.contains(&e.code))
                    || (!e.name.is_empty() && rec.message.contains(&e.name))
            });
            if let Some(idx) = matched {
                total += 1;
                hits.entry(idx).or_default().push(rec);
            }
        }

        sink.set_int("registry_match_count", total);

        for (idx, records) in &hits {
            let entry = &self.registry[*idx];
            let label = if entry.name.is_empty() {
                entry.code.clone()
            } else {
                entry.name.clone()
            };
            let component = if entry.module.is_empty() {
                "registry".to_string()
            } else {
                entry.module.clone()
            };
            let mut description = if entry.description.is_empty() {
                format!("Registry code {} seen {} time(s).", label, records.len())
            } else {
                format!("{} Seen {} time(s).", entry.description, records.len())
            };
            if !entry.troubleshooting.is_empty() {
                description.push_str(&format!(" Troubleshooting: {}.", entry.troubleshooting));
            }
            if entry.onsite_required {
                description.push_str(" On-site service required.");
            }
            let severity = entry.severity;
            sink.push_issue(severity, component, label, description, evidence(records));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceLevel, Severity};

    fn entry(code: &str, name: &str) -> RegistryEntry {
        RegistryEntry {
            module: "evic".to_string(),
            code: code.to_string(),
            error_type: "hardware".to_string(),
            name: name.to_string(),
            description: "Contactor feedback mismatch.".to_string(),
            troubleshooting: "Inspect the contactor feedback wiring".to_string(),
            onsite_required: true,
            severity: IssueSeverity::High,
        }
    }

    #[test]
    fn empty_registry_is_a_no_op() {
        let store = EventStore::default();
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        RegistryScanDetector::new(Vec::new())
            .run(&store, &mut sink)
            .unwrap();
        assert!(sink.issues().is_empty());
        assert_eq!(sink.get_int("registry_match_count"), 0);
    }

    #[test]
    fn hits_aggregate_per_code() {
        let mut records = Vec::new();
        for i in 0..2 {
            records.push(crate::domain::LogRecord {
                timestamp: Some(format!("2026-03-01T10:0{i}:00Z")),
                severity: Severity::Error,
                component: "evic".to_string(),
                message: format!("fault E-1042 raised, attempt {i}"),
                source_file: "evic.log".to_string(),
                source_line: i + 1,
            });
        }
        let store = EventStore::from_records(records);
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        RegistryScanDetector::new(vec![entry("E-1042", "ContactorFeedback")])
            .run(&store, &mut sink)
            .unwrap();

        assert_eq!(sink.get_int("registry_match_count"), 2);
        assert_eq!(sink.issues().len(), 1);
        let issue = &sink.issues()[0];
        assert!(issue.onsite_required || issue.description.contains("On-site"));
        assert!(issue.description.contains("Seen 2 time(s)"));
    }
}
