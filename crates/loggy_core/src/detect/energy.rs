use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Energy/load management: dynamic power reductions, zero-power allocations,
/// grid-side curtailment.
pub struct EnergyManagementDetector {
    re_reduction: Regex,
    re_zero_power: Regex,
    re_overload: Regex,
    re_phase: Regex,
}

impl EnergyManagementDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_reduction: compile(
                "energy",
                r"(power|current) (limit|budget).*(reduced|lowered|curtailed)|load management.*(reduc|limit)",
            )?,
            re_zero_power: compile(
                "energy",
                r"(allocated|available) (power|current).*(:|=)\s*0(\.0)?\s*(w|kw|a)?\b|zero power allocat",
            )?,
            re_overload: compile(
                "energy",
                r"(overcurrent|over-current|overload).*(detected|protection|tripped)",
            )?,
            re_phase: compile("energy", r"phase (imbalance|loss|failure)|missing phase")?,
        })
    }
}

impl Detector for EnergyManagementDetector {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let reductions = store.grep(&self.re_reduction);
        let zero_power = store.grep(&self.re_zero_power);
        let overloads = store.grep(&self.re_overload);
        let phase = store.grep(&self.re_phase);

        sink.set_int("energy_limit_reduction_count", reductions.len() as i64);
        sink.set_int("energy_zero_power_count", zero_power.len() as i64);
        sink.set_int("energy_overload_count", overloads.len() as i64);
        sink.set_int("energy_phase_fault_count", phase.len() as i64);

        for rec in overloads.iter().chain(&phase) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "energy",
                rec.message.clone(),
            );
        }

        if !zero_power.is_empty() {
            // A zero allocation halts charging entirely while the session
            // stays open, which users report as "plugged in but not charging".
            sink.push_issue(
                IssueSeverity::High,
                "energy",
                "Zero power allocated by load management",
                format!(
                    "{} event(s) where the load manager allocated 0 power to a session.",
                    zero_power.len()
                ),
                evidence(&zero_power),
            );
        }
        if !overloads.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "energy",
                "Overcurrent protection triggered",
                format!("{} overcurrent/overload trip(s).", overloads.len()),
                evidence(&overloads),
            );
        }
        if !phase.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "energy",
                "Phase fault on supply",
                format!("{} phase imbalance/loss event(s); check the feed.", phase.len()),
                evidence(&phase),
            );
        }
        if reductions.len() >= 5 {
            sink.push_issue(
                IssueSeverity::Low,
                "energy",
                "Frequent power curtailment",
                format!(
                    "{} power-limit reduction(s); sessions charged slower than rated.",
                    reductions.len()
                ),
                evidence(&reductions),
            );
        }
        Ok(())
    }
}
