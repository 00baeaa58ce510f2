use regex::Regex;

use crate::domain::IssueSeverity;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Per-connector attribution for dual-output chargers, with the
/// ratio-with-floor imbalance rule.
///
/// One connector accumulating >= 3x the other's errors AND at least 3 errors
/// absolute raises a targeted issue. The absolute floor is part of the rule:
/// without it, 1-vs-0 error counts on quiet logs would flag healthy hardware.
pub struct ConnectorImbalanceDetector {
    re_connector: Regex,
    re_error: Regex,
    re_warn: Regex,
    re_session: Regex,
}

const IMBALANCE_RATIO: i64 = 3;
const IMBALANCE_MIN_ERRORS: i64 = 3;

impl ConnectorImbalanceDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_connector: compile("connectors", r"conn(?:ector)?[ _#]?([12])\b")?,
            re_error: compile("connectors", r"error|fault|fail")?,
            re_warn: compile("connectors", r"warn")?,
            re_session: compile("connectors", r"session (start|began)|transaction start")?,
        })
    }
}

impl Detector for ConnectorImbalanceDetector {
    fn name(&self) -> &'static str {
        "connectors"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let mut errors = [0i64; 2];
        let mut warns = [0i64; 2];
        let mut sessions = [0i64; 2];
        let mut error_evidence: [Vec<&crate::domain::LogRecord>; 2] = [Vec::new(), Vec::new()];

        for rec in store.records() {
            let Some(cap) = self.re_connector.captures(&rec.message) else {
                continue;
            };
            let idx = match &cap[1] {
                "1" => 0,
                _ => 1,
            };
            if self.re_error.is_match(&rec.message) {
                errors[idx] += 1;
                error_evidence[idx].push(rec);
            } else if self.re_warn.is_match(&rec.message) {
                warns[idx] += 1;
            }
            if self.re_session.is_match(&rec.message) {
                sessions[idx] += 1;
            }
        }

        sink.set_int("connector1_errors", errors[0]);
        sink.set_int("connector2_errors", errors[1]);
        sink.set_int("connector1_warnings", warns[0]);
        sink.set_int("connector2_warnings", warns[1]);
        sink.set_int("connector1_sessions", sessions[0]);
        sink.set_int("connector2_sessions", sessions[1]);

        // Ratio-with-floor, both directions. `hi >= 3 * lo` also covers
        // lo == 0, which is why the absolute floor is checked separately.
        let (hi_idx, lo_idx) = if errors[0] >= errors[1] { (0, 1) } else { (1, 0) };
        let (hi, lo) = (errors[hi_idx], errors[lo_idx]);
        let imbalanced = hi >= IMBALANCE_MIN_ERRORS && hi >= IMBALANCE_RATIO * lo;

        sink.set_int("connector_imbalance", if imbalanced { 1 } else { 0 });

        if imbalanced {
            let ratio = if lo == 0 {
                format!("{hi}:0")
            } else {
                format!("{:.1}x", hi as f64 / lo as f64)
            };
            sink.push_issue(
                IssueSeverity::High,
                "connectors",
                format!("Connector {} error imbalance", hi_idx + 1),
                format!(
                    "Connector {} logged {hi} error(s) vs {lo} on connector {} ({ratio}); \
                     localized hardware fault on one output is likely.",
                    hi_idx + 1,
                    lo_idx + 1
                ),
                evidence(&error_evidence[hi_idx]),
            );
        }
        Ok(())
    }
}
