use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{IssueSeverity, TimelineEvent};
use crate::error::AppError;
use crate::registry::AnalysisSink;

/// Error counts bucketed by hour, with spike flags at more than 3x the
/// average bucket load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorHistogram {
    pub buckets: Vec<HistogramBucket>,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistogramBucket {
    /// Hour key, `YYYY-MM-DDTHH` in UTC.
    pub hour: String,
    pub errors: i64,
    pub spike: bool,
}

const SPIKE_FACTOR: f64 = 3.0;
const SPIKE_MIN_ERRORS: i64 = 5;

fn hour_key(ts: &str) -> Option<String> {
    // Canonical timestamps are RFC3339 UTC, so the hour key is a prefix.
    if ts.len() >= 13 {
        Some(ts[..13].to_string())
    } else {
        None
    }
}

/// Returns None when no timestamped errors exist.
pub fn analyze(
    timeline: &[TimelineEvent],
    sink: &mut AnalysisSink,
) -> Result<Option<ErrorHistogram>, AppError> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for event in timeline {
        if !event.severity.is_error() {
            continue;
        }
        if let Some(key) = event.timestamp.as_deref().and_then(hour_key) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        sink.set_int("error_spike_count", 0);
        return Ok(None);
    }

    let total: i64 = counts.values().sum();
    let average = total as f64 / counts.len() as f64;

    let buckets: Vec<HistogramBucket> = counts
        .into_iter()
        .map(|(hour, errors)| HistogramBucket {
            hour,
            errors,
            spike: errors >= SPIKE_MIN_ERRORS && errors as f64 > SPIKE_FACTOR * average,
        })
        .collect();

    let spikes: Vec<&HistogramBucket> = buckets.iter().filter(|b| b.spike).collect();
    sink.set_int("error_spike_count", spikes.len() as i64);

    if !spikes.is_empty() {
        sink.push_issue(
            IssueSeverity::Medium,
            "system",
            "Error rate spike",
            format!(
                "{} hour bucket(s) exceeded 3x the average error rate ({average:.1}/h); \
                 something acute happened in those windows.",
                spikes.len()
            ),
            spikes
                .iter()
                .map(|b| format!("{}:00Z {} errors", b.hour, b.errors))
                .collect(),
        );
    }

    Ok(Some(ErrorHistogram { buckets, average }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceLevel, Severity};

    fn err(ts: &str) -> TimelineEvent {
        TimelineEvent {
            timestamp: Some(ts.to_string()),
            severity: Severity::Error,
            component: "evic".to_string(),
            message: "fault".to_string(),
        }
    }

    #[test]
    fn spike_needs_three_times_the_average() {
        // Nine quiet hours at 1 error, one hour at 12: average 2.1, spike.
        let mut timeline = Vec::new();
        for h in 0..9 {
            timeline.push(err(&format!("2026-03-01T0{h}:10:00Z")));
        }
        for m in 10..22 {
            timeline.push(err(&format!("2026-03-01T09:{m}:00Z")));
        }
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let histogram = analyze(&timeline, &mut sink).unwrap().unwrap();
        let spikes: Vec<_> = histogram.buckets.iter().filter(|b| b.spike).collect();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].hour, "2026-03-01T09");
        assert_eq!(sink.get_int("error_spike_count"), 1);
    }

    #[test]
    fn uniform_load_never_spikes() {
        let mut timeline = Vec::new();
        for h in 10..20 {
            for m in 0..6 {
                timeline.push(err(&format!("2026-03-01T{h}:{m}0:00Z")));
            }
        }
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let histogram = analyze(&timeline, &mut sink).unwrap().unwrap();
        assert!(histogram.buckets.iter().all(|b| !b.spike));
    }
}
