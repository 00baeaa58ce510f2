use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::IssueSeverity;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

/// One reconstructed charging session, following the state lifecycle
/// Preparing -> Charging -> Finishing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChargingSession {
    pub started: Option<String>,
    pub charging_from: Option<String>,
    pub ended: Option<String>,
    /// True when the session reached Finishing; false means it was cut short.
    pub completed: bool,
    pub stop_reason: Option<String>,
}

struct Patterns {
    re_preparing: Regex,
    re_charging: Regex,
    re_finishing: Regex,
    re_stop_remote: Regex,
    re_stop_local: Regex,
    re_stop_ev: Regex,
    re_stop_fault: Regex,
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DEEP_BAD_PATTERN", "Invalid session pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

impl Patterns {
    fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_preparing: compile(r"state.*(->|to)\s*preparing|status.*preparing")?,
            re_charging: compile(r"state.*(->|to)\s*charging|status.*charging|energy transfer started")?,
            re_finishing: compile(r"state.*(->|to)\s*finishing|status.*finishing|transaction stopped")?,
            re_stop_remote: compile(r"remote ?stop|stop.*requested by (csms|central)")?,
            re_stop_local: compile(r"local ?stop|stop button|user stopped")?,
            re_stop_ev: compile(r"\b(ev|vehicle|cable)\b.*(disconnect|unplugged|removed)")?,
            re_stop_fault: compile(r"(fault|error|emergency).*stop|stopped due to (fault|error)")?,
        })
    }

    fn stop_reason(&self, message: &str) -> Option<&'static str> {
        if self.re_stop_fault.is_match(message) {
            Some("fault")
        } else if self.re_stop_remote.is_match(message) {
            Some("remote stop")
        } else if self.re_stop_local.is_match(message) {
            Some("local stop")
        } else if self.re_stop_ev.is_match(message) {
            Some("ev disconnect")
        } else {
            None
        }
    }
}

pub fn analyze(
    store: &EventStore,
    sink: &mut AnalysisSink,
) -> Result<Vec<ChargingSession>, AppError> {
    let patterns = Patterns::new()?;

    let mut sessions: Vec<ChargingSession> = Vec::new();
    let mut current: Option<ChargingSession> = None;

    for rec in store.records() {
        if patterns.re_preparing.is_match(&rec.message) {
            // A new Preparing while a session is open means the previous one
            // never reached Finishing.
            if let Some(open) = current.take() {
                sessions.push(open);
            }
            current = Some(ChargingSession {
                started: rec.timestamp.clone(),
                charging_from: None,
                ended: None,
                completed: false,
                stop_reason: None,
            });
        } else if patterns.re_charging.is_match(&rec.message) {
            if let Some(ref mut open) = current {
                if open.charging_from.is_none() {
                    open.charging_from = rec.timestamp.clone();
                }
            }
        } else if patterns.re_finishing.is_match(&rec.message) {
            if let Some(mut open) = current.take() {
                open.ended = rec.timestamp.clone();
                open.completed = true;
                if open.stop_reason.is_none() {
                    open.stop_reason = patterns.stop_reason(&rec.message).map(str::to_string);
                }
                sessions.push(open);
            }
        } else if let Some(reason) = patterns.stop_reason(&rec.message) {
            if let Some(ref mut open) = current {
                open.stop_reason = Some(reason.to_string());
            }
        }
    }
    if let Some(open) = current.take() {
        sessions.push(open);
    }

    let incomplete = sessions.iter().filter(|s| !s.completed).count();
    sink.set_int("session_count", sessions.len() as i64);
    sink.set_int("session_incomplete_count", incomplete as i64);

    if incomplete >= 3 {
        sink.push_issue(
            IssueSeverity::Medium,
            "evic",
            "Sessions not reaching Finishing",
            format!(
                "{incomplete} of {} reconstructed session(s) never reached the Finishing state.",
                sessions.len()
            ),
            sessions
                .iter()
                .filter(|s| !s.completed)
                .map(|s| {
                    format!(
                        "started {} reason {}",
                        s.started.as_deref().unwrap_or("-"),
                        s.stop_reason.as_deref().unwrap_or("unknown")
                    )
                })
                .collect(),
        );
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceLevel, LogRecord, Severity};

    fn rec(ts: &str, message: &str) -> LogRecord {
        LogRecord {
            timestamp: Some(ts.to_string()),
            severity: Severity::Info,
            component: "evic".to_string(),
            message: message.to_string(),
            source_file: "evic.log".to_string(),
            source_line: 1,
        }
    }

    #[test]
    fn lifecycle_is_reconstructed() {
        let store = EventStore::from_records(vec![
            rec("2026-03-01T10:00:00Z", "state Available -> Preparing"),
            rec("2026-03-01T10:01:00Z", "state Preparing -> Charging"),
            rec("2026-03-01T11:00:00Z", "state Charging -> Finishing"),
        ]);
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let sessions = analyze(&store, &mut sink).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].completed);
        assert_eq!(sessions[0].charging_from.as_deref(), Some("2026-03-01T10:01:00Z"));
        assert_eq!(sink.get_int("session_count"), 1);
        assert_eq!(sink.get_int("session_incomplete_count"), 0);
    }

    #[test]
    fn cut_short_session_keeps_its_stop_reason() {
        let store = EventStore::from_records(vec![
            rec("2026-03-01T10:00:00Z", "state Available -> Preparing"),
            rec("2026-03-01T10:01:00Z", "state Preparing -> Charging"),
            rec("2026-03-01T10:05:00Z", "vehicle disconnected during charge"),
            rec("2026-03-01T10:30:00Z", "state Available -> Preparing"),
        ]);
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let sessions = analyze(&store, &mut sink).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(!sessions[0].completed);
        assert_eq!(sessions[0].stop_reason.as_deref(), Some("ev disconnect"));
    }
}
