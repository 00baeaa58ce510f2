use loggy_core::detect::{self, Detector};
use loggy_core::domain::{EvidenceLevel, IssueSeverity, LogRecord, Severity};
use loggy_core::error::AppError;
use loggy_core::registry::AnalysisSink;
use loggy_core::store::EventStore;

fn record(minute: usize, component: &str, message: &str) -> LogRecord {
    LogRecord {
        timestamp: Some(format!("2026-03-01T10:{minute:02}:00Z")),
        severity: Severity::Error,
        component: component.to_string(),
        message: message.to_string(),
        source_file: format!("{component}.log"),
        source_line: minute + 1,
    }
}

#[test]
fn every_detector_is_idempotent_on_empty_input() {
    let store = EventStore::default();
    let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
    let detectors = detect::default_detectors(Vec::new(), Vec::new()).expect("bank");
    detect::run_detectors(&detectors, &store, &mut sink);

    assert!(sink.issues().is_empty(), "issues: {:?}", sink.issues());
    assert_eq!(sink.get_int("detector_errors"), 0);
}

#[test]
fn every_issue_has_a_known_severity_and_description() {
    let mut records = Vec::new();
    for i in 0..3 {
        records.push(record(i, "mqtt_client", "mqtt connect failed: broker unreachable"));
        records.push(record(i + 10, "evic", "contactor stuck, failed to open"));
        records.push(record(i + 20, "meter", "required meter not found on bus"));
    }
    let store = EventStore::from_records(records);
    let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
    let detectors = detect::default_detectors(Vec::new(), Vec::new()).expect("bank");
    detect::run_detectors(&detectors, &store, &mut sink);

    assert!(!sink.issues().is_empty());
    for issue in sink.issues() {
        assert!(!issue.description.is_empty(), "empty description: {issue:?}");
        assert!(matches!(
            issue.severity,
            IssueSeverity::Critical | IssueSeverity::High | IssueSeverity::Medium | IssueSeverity::Low
        ));
    }
}

fn imbalance_run(c1_errors: usize, c2_errors: usize) -> AnalysisSink {
    let mut records = Vec::new();
    for i in 0..c1_errors {
        records.push(record(i, "evic", "connector 1 relay fault"));
    }
    for i in 0..c2_errors {
        records.push(record(30 + i, "evic", "connector 2 relay fault"));
    }
    let store = EventStore::from_records(records);
    let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
    let detector = detect::connectors::ConnectorImbalanceDetector::new().expect("detector");
    detector.run(&store, &mut sink).expect("run");
    sink
}

#[test]
fn imbalance_fires_on_ratio_with_floor() {
    let sink = imbalance_run(9, 2);
    assert_eq!(sink.get_int("connector1_errors"), 9);
    assert_eq!(sink.get_int("connector2_errors"), 2);
    assert_eq!(sink.get_int("connector_imbalance"), 1);
    assert!(sink
        .issues()
        .iter()
        .any(|i| i.severity == IssueSeverity::High && i.title.contains("imbalance")));
}

#[test]
fn imbalance_needs_three_times_the_other_connector() {
    let sink = imbalance_run(4, 2);
    assert_eq!(sink.get_int("connector_imbalance"), 0);
    assert!(sink.issues().is_empty());
}

#[test]
fn imbalance_needs_three_errors_absolute() {
    let sink = imbalance_run(2, 0);
    assert_eq!(sink.get_int("connector_imbalance"), 0);
    assert!(sink.issues().is_empty());
}

#[test]
fn severity_policy_is_pattern_specific_for_the_meter() {
    let store = EventStore::from_records(vec![
        record(0, "meter", "required meter not found on bus"),
        record(1, "meter", "meter readings stalled, value did not change"),
    ]);
    let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
    let detector = detect::meter::MeterDetector::new().expect("detector");
    detector.run(&store, &mut sink).expect("run");

    let severities: Vec<IssueSeverity> = sink.issues().iter().map(|i| i.severity).collect();
    assert!(severities.contains(&IssueSeverity::Critical));
    assert!(severities.contains(&IssueSeverity::Medium));
}

struct AlwaysFails;

impl Detector for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    fn run(&self, _store: &EventStore, _sink: &mut AnalysisSink) -> Result<(), AppError> {
        Err(AppError::new("DETECTOR_BOOM", "synthetic failure"))
    }
}

#[test]
fn one_failing_detector_does_not_stop_the_bank() {
    let store = EventStore::from_records(vec![record(
        0,
        "mqtt_client",
        "mqtt connect failed: broker unreachable",
    )]);
    let mut sink = AnalysisSink::new(EvidenceLevel::Standard);
    let detectors: Vec<Box<dyn Detector>> = vec![
        Box::new(AlwaysFails),
        Box::new(detect::connectivity::CloudMqttDetector::new().expect("detector")),
    ];
    detect::run_detectors(&detectors, &store, &mut sink);

    assert_eq!(sink.get_int("detector_errors"), 1);
    assert!(sink.warnings().iter().any(|w| w.code == "DETECTOR_FAILED"));
    assert_eq!(sink.get_int("mqtt_fail_count"), 1);
}

#[test]
fn evidence_is_capped_by_level() {
    let mut records = Vec::new();
    for i in 0..8 {
        records.push(record(i, "mqtt_client", "mqtt connect failed: broker unreachable"));
    }
    let store = EventStore::from_records(records);
    let mut sink = AnalysisSink::new(EvidenceLevel::Min);
    let detector = detect::connectivity::CloudMqttDetector::new().expect("detector");
    detector.run(&store, &mut sink).expect("run");

    assert_eq!(sink.issues().len(), 1);
    assert_eq!(sink.issues()[0].evidence.len(), 1);
}
