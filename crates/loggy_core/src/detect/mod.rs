pub mod config;
pub mod connectivity;
pub mod connectors;
pub mod energy;
pub mod evic;
pub mod hardware;
pub mod hlc;
pub mod meter;
pub mod ocpp;
pub mod process;
pub mod registry_scan;
pub mod safety;

use std::path::PathBuf;

use regex::Regex;

use crate::domain::{CollectionWarning, LogRecord};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::signatures::RegistryEntry;
use crate::store::EventStore;

/// One fault-family scanner. Detectors are mutually independent: each owns a
/// disjoint set of metric names and never reads another detector's output.
pub trait Detector {
    fn name(&self) -> &'static str;
    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError>;
}

/// Run every registered detector with per-detector failure isolation: a
/// failing detector increments `detector_errors` and surfaces a warning, and
/// the remaining detectors still run.
pub fn run_detectors(
    detectors: &[Box<dyn Detector>],
    store: &EventStore,
    sink: &mut AnalysisSink,
) {
    for detector in detectors {
        if let Err(e) = detector.run(store, sink) {
            sink.add("detector_errors", 1);
            sink.push_warning(
                CollectionWarning::new(
                    "DETECTOR_FAILED",
                    format!("Detector {} failed; run continues", detector.name()),
                )
                .with_details(e.to_string()),
            );
        }
    }
}

/// The full bank. New detectors are added here by registration, not by
/// editing a dispatch table elsewhere.
pub fn default_detectors(
    registry: Vec<RegistryEntry>,
    config_files: Vec<PathBuf>,
) -> Result<Vec<Box<dyn Detector>>, AppError> {
    Ok(vec![
        Box::new(connectivity::CloudMqttDetector::new()?),
        Box::new(connectivity::CellularDetector::new()?),
        Box::new(connectivity::LinkStateDetector::new()?),
        Box::new(ocpp::OcppDetector::new()?),
        Box::new(evic::ChargePointStateDetector::new()?),
        Box::new(connectors::ConnectorImbalanceDetector::new()?),
        Box::new(hlc::HlcErrorCodeDetector::new()?),
        Box::new(energy::EnergyManagementDetector::new()?),
        Box::new(hardware::SecurityHardwareDetector::new()?),
        Box::new(hardware::StorageHealthDetector::new()?),
        Box::new(hardware::ThermalDetector::new()?),
        Box::new(process::ProcessSupervisionDetector::new()?),
        Box::new(meter::MeterDetector::new()?),
        Box::new(safety::SafetyEventDetector::new()?),
        Box::new(config::ConfigValidationDetector::new(config_files)),
        Box::new(registry_scan::RegistryScanDetector::new(registry)),
    ])
}

pub(crate) fn compile(detector: &str, pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DETECTOR_BAD_PATTERN", "Invalid detector pattern")
            .with_details(format!("detector={detector}; pattern={pattern}; err={e}"))
    })
}

/// Evidence lines keep the canonical timestamp prefix so reports stay
/// readable without the event store.
pub(crate) fn evidence(records: &[&LogRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| {
            format!(
                "{} {}",
                r.timestamp.as_deref().unwrap_or("-"),
                r.message
            )
        })
        .collect()
}
