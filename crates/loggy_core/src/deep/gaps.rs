use serde::{Deserialize, Serialize};
use time::Duration;

use crate::domain::{IssueSeverity, TimelineEvent};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::parse_canonical;

/// A stretch of timeline silence longer than the gap threshold. Silence
/// usually means a crash, a log rotation that lost data, or a power loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SilenceGap {
    pub start: String,
    pub end: String,
    pub minutes: i64,
}

const GAP_THRESHOLD_MINUTES: i64 = 30;

pub fn analyze(
    timeline: &[TimelineEvent],
    sink: &mut AnalysisSink,
) -> Result<Vec<SilenceGap>, AppError> {
    let stamped: Vec<(&TimelineEvent, time::OffsetDateTime)> = timeline
        .iter()
        .filter_map(|e| {
            e.timestamp
                .as_deref()
                .and_then(parse_canonical)
                .map(|ts| (e, ts))
        })
        .collect();

    let mut gaps = Vec::new();
    for pair in stamped.windows(2) {
        let (prev, prev_ts) = pair[0];
        let (next, next_ts) = pair[1];
        let gap = next_ts - prev_ts;
        if gap > Duration::minutes(GAP_THRESHOLD_MINUTES) {
            if let (Some(start), Some(end)) = (prev.timestamp.clone(), next.timestamp.clone()) {
                gaps.push(SilenceGap {
                    start,
                    end,
                    minutes: gap.whole_minutes(),
                });
            }
        }
    }

    sink.set_int("timeline_gap_count", gaps.len() as i64);

    if !gaps.is_empty() {
        let longest = gaps.iter().map(|g| g.minutes).max().unwrap_or(0);
        sink.push_issue(
            IssueSeverity::Low,
            "system",
            "Timeline silence gaps",
            format!(
                "{} silence gap(s) over {GAP_THRESHOLD_MINUTES} minutes (longest {longest} min); \
                 possible crash, rotation loss or power interruption.",
                gaps.len()
            ),
            gaps.iter()
                .map(|g| format!("{} .. {} ({} min)", g.start, g.end, g.minutes))
                .collect(),
        );
    }
    Ok(gaps)
}
