use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Energy meter health. A missing required meter is CRITICAL: billing-grade
/// measurement is a legal requirement, and most firmwares refuse to charge
/// without it.
pub struct MeterDetector {
    re_missing: Regex,
    re_stall: Regex,
    re_comm: Regex,
}

impl MeterDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_missing: compile(
                "meter",
                r"(required )?meter.*(not (found|detected|present)|missing|unavailable)",
            )?,
            re_stall: compile(
                "meter",
                r"meter.*(read(ing)?s? (stall|stuck|unchanged|frozen)|no new (values|readings)|value did not change)",
            )?,
            re_comm: compile(
                "meter",
                r"meter.*(communication|modbus|rs-?485).*(error|timeout|fail)|modbus.*(timeout|crc error)",
            )?,
        })
    }
}

impl Detector for MeterDetector {
    fn name(&self) -> &'static str {
        "meter"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let missing = store.grep(&self.re_missing);
        let stalls = store.grep(&self.re_stall);
        let comm = store.grep(&self.re_comm);

        sink.set_int("meter_missing_count", missing.len() as i64);
        sink.set_int("meter_stall_count", stalls.len() as i64);
        sink.set_int("meter_comm_error_count", comm.len() as i64);

        for rec in &missing {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Critical,
                "meter",
                rec.message.clone(),
            );
        }

        if !missing.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "meter",
                "Required energy meter not detected",
                format!(
                    "{} report(s) of a required meter missing; charging is blocked until it returns.",
                    missing.len()
                ),
                evidence(&missing),
            );
        }
        if !stalls.is_empty() {
            sink.push_issue(
                IssueSeverity::Medium,
                "meter",
                "Meter readings stalled",
                format!(
                    "{} stalled-reading report(s); energy totals during this period are unreliable.",
                    stalls.len()
                ),
                evidence(&stalls),
            );
        }
        if comm.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "meter",
                "Meter bus communication errors",
                format!("{} meter communication error(s); check wiring and termination.", comm.len()),
                evidence(&comm),
            );
        }
        Ok(())
    }
}
