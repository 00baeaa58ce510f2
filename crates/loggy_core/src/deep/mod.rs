pub mod boot;
pub mod gaps;
pub mod histogram;
pub mod network;
pub mod reboots;
pub mod sessions;
pub mod statemachine;

use serde::{Deserialize, Serialize};

use crate::domain::CollectionWarning;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

/// Results of the standalone timeline modules. Each field is independent;
/// a failed module leaves its field at the default and the others still run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeepAnalysis {
    pub boot: Option<boot::BootAnalysis>,
    pub gaps: Vec<gaps::SilenceGap>,
    pub histogram: Option<histogram::ErrorHistogram>,
    pub sessions: Vec<sessions::ChargingSession>,
    pub reboots: Vec<reboots::RebootEvent>,
    pub network: Option<network::NetworkLifecycle>,
    pub state_machine: Vec<statemachine::StateMachineFinding>,
}

fn module_failed(sink: &mut AnalysisSink, module: &str, e: AppError) {
    sink.add("detector_errors", 1);
    sink.push_warning(
        CollectionWarning::new(
            "DEEP_MODULE_FAILED",
            format!("Deep-analysis module {module} failed; run continues"),
        )
        .with_details(e.to_string()),
    );
}

/// Run every deep-analysis module with the same per-module isolation the
/// detector bank uses.
pub fn run_deep_analysis(store: &EventStore, sink: &mut AnalysisSink) -> DeepAnalysis {
    let timeline = store.timeline();
    let mut out = DeepAnalysis::default();

    match boot::analyze(store, sink) {
        Ok(v) => out.boot = v,
        Err(e) => module_failed(sink, "boot", e),
    }
    match gaps::analyze(&timeline, sink) {
        Ok(v) => out.gaps = v,
        Err(e) => module_failed(sink, "gaps", e),
    }
    match histogram::analyze(&timeline, sink) {
        Ok(v) => out.histogram = v,
        Err(e) => module_failed(sink, "histogram", e),
    }
    match sessions::analyze(store, sink) {
        Ok(v) => out.sessions = v,
        Err(e) => module_failed(sink, "sessions", e),
    }
    match reboots::analyze(&timeline, sink) {
        Ok(v) => out.reboots = v,
        Err(e) => module_failed(sink, "reboots", e),
    }
    match network::analyze(store, sink) {
        Ok(v) => out.network = Some(v),
        Err(e) => module_failed(sink, "network", e),
    }
    match statemachine::analyze(&timeline, sink) {
        Ok(v) => out.state_machine = v,
        Err(e) => module_failed(sink, "statemachine", e),
    }
    out
}
