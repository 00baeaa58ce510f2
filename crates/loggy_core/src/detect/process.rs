use std::collections::BTreeMap;

use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Service supervision: crash/restart loops, OOM kills, watchdog resets,
/// sustained high CPU.
pub struct ProcessSupervisionDetector {
    re_restart: Regex,
    re_crash: Regex,
    re_oom: Regex,
    re_watchdog: Regex,
    re_high_cpu: Regex,
    re_unit: Regex,
}

const CRASH_LOOP_THRESHOLD: usize = 3;

impl ProcessSupervisionDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_restart: compile(
                "process",
                r"(service|unit|process).*(restart(ed|ing)?|respawn)|scheduled restart job",
            )?,
            re_crash: compile(
                "process",
                r"(segfault|core dumped|main process exited.*(code|status)|crashed|abort(ed)? \(signal)",
            )?,
            re_oom: compile("process", r"out of memory|oom-?kill(er)?|killed process \d+")?,
            re_watchdog: compile("process", r"watchdog.*(timeout|expired|reset|did not respond)")?,
            re_high_cpu: compile("process", r"cpu (usage|load).*(9[0-9]|100)\s*%|load average.*(\b[1-9]\d\.)")?,
            re_unit: compile("process", r"([a-z][a-z0-9_.-]+\.service)|process '?([a-z][a-z0-9_-]{2,})'?")?,
        })
    }

    fn unit_of(&self, message: &str) -> Option<String> {
        let caps = self.re_unit.captures(message)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }
}

impl Detector for ProcessSupervisionDetector {
    fn name(&self) -> &'static str {
        "process"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let restarts = store.grep(&self.re_restart);
        let crashes = store.grep(&self.re_crash);
        let ooms = store.grep(&self.re_oom);
        let watchdogs = store.grep(&self.re_watchdog);
        let high_cpu = store.grep(&self.re_high_cpu);

        sink.set_int("service_restart_count", restarts.len() as i64);
        sink.set_int("process_crash_count", crashes.len() as i64);
        sink.set_int("oom_kill_count", ooms.len() as i64);
        sink.set_int("watchdog_reset_count", watchdogs.len() as i64);
        sink.set_int("high_cpu_count", high_cpu.len() as i64);

        for rec in crashes.iter().chain(&ooms).chain(&watchdogs) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "process",
                rec.message.clone(),
            );
        }

        // Restart-loop attribution per unit where the unit name is visible.
        let mut per_unit: BTreeMap<String, Vec<&crate::domain::LogRecord>> = BTreeMap::new();
        for rec in &restarts {
            if let Some(unit) = self.unit_of(&rec.message) {
                per_unit.entry(unit).or_default().push(rec);
            }
        }
        for (unit, records) in &per_unit {
            if records.len() >= CRASH_LOOP_THRESHOLD {
                sink.push_issue(
                    IssueSeverity::High,
                    "process",
                    format!("Restart loop: {unit}"),
                    format!("{unit} restarted {} time(s) during the capture.", records.len()),
                    evidence(records),
                );
            }
        }

        if !ooms.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "process",
                "Out-of-memory kills",
                format!("{} OOM kill(s); a process is leaking or the box is undersized.", ooms.len()),
                evidence(&ooms),
            );
        }
        if !watchdogs.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "process",
                "Watchdog timeouts",
                format!("{} watchdog event(s); a supervised task stopped feeding it.", watchdogs.len()),
                evidence(&watchdogs),
            );
        }
        if crashes.len() >= 2 {
            sink.push_issue(
                IssueSeverity::Medium,
                "process",
                "Process crashes",
                format!("{} crash(es) recorded.", crashes.len()),
                evidence(&crashes),
            );
        }
        if high_cpu.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Low,
                "process",
                "Sustained high CPU",
                format!("{} high-CPU report(s).", high_cpu.len()),
                evidence(&high_cpu),
            );
        }
        Ok(())
    }
}
