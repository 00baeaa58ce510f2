use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Physical safety events: enclosure tamper, emergency stop, residual current
/// trips. These are always surfaced regardless of count.
pub struct SafetyEventDetector {
    re_tamper: Regex,
    re_estop: Regex,
    re_rcd: Regex,
    re_ground: Regex,
}

impl SafetyEventDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_tamper: compile("safety", r"(lid|cover|enclosure|door).*(open(ed)?|tamper|removed)")?,
            re_estop: compile("safety", r"(emergency stop|e-?stop).*(pressed|activated|engaged|triggered)")?,
            re_rcd: compile("safety", r"(rcd|rcmb?|residual current).*(trip|fault|triggered|detected)")?,
            re_ground: compile("safety", r"(ground|earth) (fault|failure)|pe (missing|fault)")?,
        })
    }
}

impl Detector for SafetyEventDetector {
    fn name(&self) -> &'static str {
        "safety"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let tamper = store.grep(&self.re_tamper);
        let estop = store.grep(&self.re_estop);
        let rcd = store.grep(&self.re_rcd);
        let ground = store.grep(&self.re_ground);

        sink.set_int("tamper_event_count", tamper.len() as i64);
        sink.set_int("estop_event_count", estop.len() as i64);
        sink.set_int("rcd_trip_count", rcd.len() as i64);
        sink.set_int("ground_fault_count", ground.len() as i64);

        for rec in tamper.iter().chain(&estop).chain(&rcd).chain(&ground) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Critical,
                "safety",
                rec.message.clone(),
            );
        }

        if !estop.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "safety",
                "Emergency stop activated",
                format!("{} e-stop activation(s).", estop.len()),
                evidence(&estop),
            );
        }
        if !rcd.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "safety",
                "Residual current device tripped",
                format!("{} RCD trip(s); an insulation or leakage fault is present.", rcd.len()),
                evidence(&rcd),
            );
        }
        if !ground.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "safety",
                "Ground fault reported",
                format!("{} ground/earth fault(s).", ground.len()),
                evidence(&ground),
            );
        }
        if !tamper.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "safety",
                "Enclosure tamper detected",
                format!("{} lid/cover tamper event(s).", tamper.len()),
                evidence(&tamper),
            );
        }
        Ok(())
    }
}
