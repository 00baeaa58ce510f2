use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// EVIC charge-point state machine faults: transitions into Faulted, stuck
/// contactors, pilot errors.
pub struct ChargePointStateDetector {
    re_faulted: Regex,
    re_contactor: Regex,
    re_pilot: Regex,
    re_session_abort: Regex,
}

impl ChargePointStateDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_faulted: compile("evic_state", r"state.*(->|to)\s*faulted|entered fault state")?,
            re_contactor: compile(
                "evic_state",
                r"contactor.*(stuck|welded|failed to (open|close))",
            )?,
            re_pilot: compile("evic_state", r"(control )?pilot.*(error|fault|invalid state [EF])")?,
            re_session_abort: compile(
                "evic_state",
                r"(charging )?session.*(abort|terminated unexpectedly|dropped)",
            )?,
        })
    }
}

impl Detector for ChargePointStateDetector {
    fn name(&self) -> &'static str {
        "evic_state"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let faults = store.grep(&self.re_faulted);
        let contactor = store.grep(&self.re_contactor);
        let pilot = store.grep(&self.re_pilot);
        let aborts = store.grep(&self.re_session_abort);

        sink.set_int("evic_fault_count", faults.len() as i64);
        sink.set_int("evic_contactor_fault_count", contactor.len() as i64);
        sink.set_int("evic_pilot_error_count", pilot.len() as i64);
        sink.set_int("evic_session_abort_count", aborts.len() as i64);

        for rec in faults.iter().chain(&contactor).chain(&aborts) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "evic",
                rec.message.clone(),
            );
        }

        if !contactor.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "evic",
                "Contactor fault",
                format!(
                    "{} contactor fault(s); the output stage cannot switch safely.",
                    contactor.len()
                ),
                evidence(&contactor),
            );
        }
        if !faults.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "evic",
                "Charge point entered Faulted state",
                format!("{} transition(s) into the Faulted state.", faults.len()),
                evidence(&faults),
            );
        }
        if pilot.len() >= 2 {
            sink.push_issue(
                IssueSeverity::Medium,
                "evic",
                "Control pilot errors",
                format!(
                    "{} pilot error(s); cable or vehicle-side signalling problems.",
                    pilot.len()
                ),
                evidence(&pilot),
            );
        }
        if aborts.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "evic",
                "Charging sessions aborted",
                format!("{} session(s) terminated unexpectedly.", aborts.len()),
                evidence(&aborts),
            );
        }
        Ok(())
    }
}
