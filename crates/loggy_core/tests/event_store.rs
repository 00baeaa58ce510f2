use loggy_core::domain::{LogRecord, Severity};
use loggy_core::store::EventStore;
use regex::Regex;

fn record(minute: usize, severity: Severity, component: &str, message: &str) -> LogRecord {
    LogRecord {
        timestamp: Some(format!("2026-03-01T10:{minute:02}:00Z")),
        severity,
        component: component.to_string(),
        message: message.to_string(),
        source_file: format!("{component}.log"),
        source_line: minute + 1,
    }
}

fn sample_store() -> EventStore {
    EventStore::from_records(vec![
        record(0, Severity::Info, "mqtt_client", "mqtt connected"),
        record(1, Severity::Error, "mqtt_client", "mqtt connect failed"),
        record(2, Severity::Warn, "evic", "pilot signal unstable"),
        record(3, Severity::Error, "evic", "contactor fault"),
        LogRecord {
            timestamp: None,
            severity: Severity::Info,
            component: "kernel".to_string(),
            message: "[    2.000000] Booting Linux".to_string(),
            source_file: "dmesg".to_string(),
            source_line: 1,
        },
    ])
}

#[test]
fn filters_cover_component_severity_and_range() {
    let store = sample_store();
    assert_eq!(store.len(), 5);
    assert_eq!(store.components(), vec!["evic", "kernel", "mqtt_client"]);
    assert_eq!(store.component("evic").len(), 2);
    assert_eq!(store.components_matching("MQTT").len(), 2);
    assert_eq!(store.with_severity(Severity::Error).len(), 2);

    let windowed = store.in_range(Some("2026-03-01T10:01:00Z"), Some("2026-03-01T10:02:00Z"));
    assert_eq!(windowed.len(), 2);
}

#[test]
fn grep_is_format_agnostic() {
    let store = sample_store();
    let re = Regex::new("(?i)fault|failed").unwrap();
    assert_eq!(store.grep(&re).len(), 2);
}

#[test]
fn census_reconciles_with_per_severity_counts() {
    let store = sample_store();
    let census = store.component_census();
    assert_eq!(census["mqtt_client"].total, 2);
    assert_eq!(census["mqtt_client"].errors, 1);
    assert_eq!(census["evic"].warnings, 1);

    let total: i64 = census.values().map(|c| c.total).sum();
    assert_eq!(total, store.len() as i64);
}

#[test]
fn parsed_lines_round_trip() {
    let store = sample_store();
    let lines = store.to_parsed_lines();
    assert_eq!(lines[0], "2026-03-01T10:00:00Z|I|mqtt_client|mqtt connected");
    assert!(lines[4].starts_with("-|I|kernel|"));

    let back = EventStore::from_parsed_line(&lines[1], "roundtrip.parsed", 2).expect("parse");
    assert_eq!(back.timestamp.as_deref(), Some("2026-03-01T10:01:00Z"));
    assert_eq!(back.severity, Severity::Error);
    assert_eq!(back.component, "mqtt_client");
    assert_eq!(back.message, "mqtt connect failed");
}

#[test]
fn timeline_orders_stamped_events_first() {
    let store = EventStore::from_records(vec![
        LogRecord {
            timestamp: None,
            severity: Severity::Info,
            component: "kernel".to_string(),
            message: "[    2.000000] Booting Linux".to_string(),
            source_file: "dmesg".to_string(),
            source_line: 1,
        },
        record(5, Severity::Error, "evic", "contactor fault"),
        record(1, Severity::Info, "mqtt_client", "mqtt connected"),
    ]);

    let timeline = store.timeline();
    assert_eq!(timeline[0].timestamp.as_deref(), Some("2026-03-01T10:01:00Z"));
    assert_eq!(timeline[1].timestamp.as_deref(), Some("2026-03-01T10:05:00Z"));
    assert!(timeline[2].timestamp.is_none());
}
