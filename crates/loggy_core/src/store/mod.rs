use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{LogRecord, Severity, TimelineEvent};

/// Per-component line counts used by reporters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentCensus {
    pub total: i64,
    pub errors: i64,
    pub warnings: i64,
}

/// Append-only, read-only-after-population store of normalized records.
///
/// Populated once, fully, before any detector runs; detectors only read.
/// Many detectors scan message text with regexes rather than structured
/// predicates — fault signatures are an evolving vocabulary of vendor error
/// strings, so messages stay opaque strings with structured metadata
/// alongside.
#[derive(Debug, Default)]
pub struct EventStore {
    records: Vec<LogRecord>,
    by_component: BTreeMap<String, Vec<usize>>,
}

pub fn parse_canonical(ts: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(ts, &Rfc3339).ok()
}

impl EventStore {
    pub fn from_records(records: Vec<LogRecord>) -> Self {
        let mut by_component: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, rec) in records.iter().enumerate() {
            by_component.entry(rec.component.clone()).or_default().push(idx);
        }
        Self {
            records,
            by_component,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn components(&self) -> Vec<String> {
        self.by_component.keys().cloned().collect()
    }

    pub fn component(&self, name: &str) -> Vec<&LogRecord> {
        self.by_component
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Records from every component whose name contains `fragment`
    /// (case-insensitive). Vendor bundles are inconsistent about exact file
    /// names, so detectors select components by fragment.
    pub fn components_matching(&self, fragment: &str) -> Vec<&LogRecord> {
        let needle = fragment.to_ascii_lowercase();
        let mut out = Vec::new();
        for (name, idxs) in &self.by_component {
            if name.to_ascii_lowercase().contains(&needle) {
                out.extend(idxs.iter().map(|&i| &self.records[i]));
            }
        }
        out
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<&LogRecord> {
        self.records.iter().filter(|r| r.severity == severity).collect()
    }

    /// Records whose canonical timestamp falls in `[after, before]`
    /// (either bound optional). Records without a timestamp are excluded.
    pub fn in_range(&self, after: Option<&str>, before: Option<&str>) -> Vec<&LogRecord> {
        let after = after.and_then(parse_canonical);
        let before = before.and_then(parse_canonical);
        self.records
            .iter()
            .filter(|r| {
                let Some(ts) = r.timestamp.as_deref().and_then(parse_canonical) else {
                    return false;
                };
                if let Some(a) = after {
                    if ts < a {
                        return false;
                    }
                }
                if let Some(b) = before {
                    if ts > b {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Format-agnostic text extraction: every record whose message matches.
    pub fn grep(&self, pattern: &Regex) -> Vec<&LogRecord> {
        self.records
            .iter()
            .filter(|r| pattern.is_match(&r.message))
            .collect()
    }

    /// Per-component `{total, errors, warnings}` counts.
    pub fn component_census(&self) -> BTreeMap<String, ComponentCensus> {
        let mut out = BTreeMap::new();
        for (name, idxs) in &self.by_component {
            let mut census = ComponentCensus {
                total: idxs.len() as i64,
                errors: 0,
                warnings: 0,
            };
            for &i in idxs {
                match self.records[i].severity {
                    Severity::Error | Severity::Critical => census.errors += 1,
                    Severity::Warn => census.warnings += 1,
                    _ => {}
                }
            }
            out.insert(name.clone(), census);
        }
        out
    }

    /// Export in the pipe-delimited normalized shape collaborators persist:
    /// `TS|S|component|message` with `-` for a missing timestamp.
    pub fn to_parsed_lines(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| {
                format!(
                    "{}|{}|{}|{}",
                    r.timestamp.as_deref().unwrap_or("-"),
                    r.severity.letter(),
                    r.component,
                    r.message
                )
            })
            .collect()
    }

    /// Re-parse one pipe-delimited normalized line.
    pub fn from_parsed_line(line: &str, source_file: &str, source_line: usize) -> Option<LogRecord> {
        let mut parts = line.splitn(4, '|');
        let ts = parts.next()?.trim();
        let sev = parts.next()?.trim();
        let component = parts.next()?.trim();
        let message = parts.next()?.to_string();
        Some(LogRecord {
            timestamp: if ts == "-" || ts.is_empty() {
                None
            } else {
                Some(ts.to_string())
            },
            severity: Severity::from_letter(sev.chars().next().unwrap_or('N')),
            component: component.to_string(),
            message,
            source_file: source_file.to_string(),
            source_line,
        })
    }

    /// The timeline substrate: every record as a TimelineEvent, timestamped
    /// events first in ascending order, untimestamped events after in source
    /// order. Sorting is a read-side concern; storage keeps source order.
    pub fn timeline(&self) -> Vec<TimelineEvent> {
        let mut stamped: Vec<&LogRecord> = Vec::new();
        let mut unstamped: Vec<&LogRecord> = Vec::new();
        for r in &self.records {
            if r.timestamp.is_some() {
                stamped.push(r);
            } else {
                unstamped.push(r);
            }
        }
        stamped.sort_by_key(|r| r.timestamp.as_deref().and_then(parse_canonical));
        stamped
            .into_iter()
            .chain(unstamped)
            .map(|r| TimelineEvent {
                timestamp: r.timestamp.clone(),
                severity: r.severity,
                component: r.component.clone(),
                message: r.message.clone(),
            })
            .collect()
    }
}
