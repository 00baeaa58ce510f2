use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{IssueSeverity, TimelineEvent};
use crate::error::AppError;
use crate::registry::AnalysisSink;

/// A connector state-machine anomaly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateMachineFinding {
    pub kind: FindingKind,
    pub timestamp: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FindingKind {
    /// Entered Faulted and never left it before the capture ended.
    StuckInFault,
    /// Repeated watchdog warnings climbing in severity before a reset.
    EscalatingWatchdog,
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DEEP_BAD_PATTERN", "Invalid state-machine pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

pub fn analyze(
    timeline: &[TimelineEvent],
    sink: &mut AnalysisSink,
) -> Result<Vec<StateMachineFinding>, AppError> {
    let re_enter_fault = compile(r"state.*(->|to)\s*faulted|entered fault state")?;
    let re_leave_fault = compile(r"state.*faulted\s*(->|to)|fault (cleared|recovered)")?;
    let re_watchdog_warn = compile(r"watchdog.*(warn|late|slow|missed feed)")?;
    let re_watchdog_reset = compile(r"watchdog.*(timeout|expired|reset)")?;

    let mut findings = Vec::new();

    // Stuck-in-fault: a fault entry with no later recovery.
    let mut open_fault: Option<&TimelineEvent> = None;
    for event in timeline {
        if re_enter_fault.is_match(&event.message) {
            open_fault = Some(event);
        } else if re_leave_fault.is_match(&event.message) {
            open_fault = None;
        }
    }
    if let Some(event) = open_fault {
        findings.push(StateMachineFinding {
            kind: FindingKind::StuckInFault,
            timestamp: event.timestamp.clone(),
            description: format!(
                "Connector entered Faulted and never recovered before the capture ended: {}",
                event.message
            ),
        });
    }

    // Escalating watchdog: warnings piling up before a reset fires.
    let mut warn_streak = 0usize;
    for event in timeline {
        if re_watchdog_warn.is_match(&event.message) {
            warn_streak += 1;
        } else if re_watchdog_reset.is_match(&event.message) {
            if warn_streak >= 2 {
                findings.push(StateMachineFinding {
                    kind: FindingKind::EscalatingWatchdog,
                    timestamp: event.timestamp.clone(),
                    description: format!(
                        "{warn_streak} watchdog warning(s) escalated into a reset: {}",
                        event.message
                    ),
                });
            }
            warn_streak = 0;
        }
    }

    sink.set_int("state_machine_finding_count", findings.len() as i64);

    for finding in &findings {
        let (severity, title) = match finding.kind {
            FindingKind::StuckInFault => (IssueSeverity::High, "Connector stuck in Faulted"),
            FindingKind::EscalatingWatchdog => {
                (IssueSeverity::High, "Escalating watchdog pattern")
            }
        };
        sink.push_issue(
            severity,
            "evic",
            title,
            finding.description.clone(),
            Vec::new(),
        );
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceLevel, Severity};

    fn event(ts: &str, message: &str) -> TimelineEvent {
        TimelineEvent {
            timestamp: Some(ts.to_string()),
            severity: Severity::Warn,
            component: "evic".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn recovered_fault_is_not_stuck() {
        let timeline = vec![
            event("2026-03-01T10:00:00Z", "state Charging -> Faulted"),
            event("2026-03-01T10:05:00Z", "fault cleared, state Faulted -> Available"),
        ];
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let findings = analyze(&timeline, &mut sink).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn unrecovered_fault_is_flagged() {
        let timeline = vec![event("2026-03-01T10:00:00Z", "state Charging -> Faulted")];
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let findings = analyze(&timeline, &mut sink).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::StuckInFault);
        assert_eq!(sink.issues().len(), 1);
    }

    #[test]
    fn watchdog_escalation_needs_a_streak() {
        let timeline = vec![
            event("2026-03-01T10:00:00Z", "watchdog feed late"),
            event("2026-03-01T10:01:00Z", "watchdog feed missed feed"),
            event("2026-03-01T10:02:00Z", "watchdog timeout, forcing reset"),
        ];
        let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
        let findings = analyze(&timeline, &mut sink).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::EscalatingWatchdog);
    }
}
