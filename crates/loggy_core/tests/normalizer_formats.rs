use std::fs;
use std::path::Path;

use tempfile::tempdir;

use loggy_core::domain::Severity;
use loggy_core::normalize::{component_from_path, Normalizer};

fn normalize_one(path: &Path, component: &str) -> (Vec<loggy_core::domain::LogRecord>, Vec<loggy_core::domain::CollectionWarning>) {
    let normalizer = Normalizer::new().expect("normalizer");
    let mut warnings = Vec::new();
    let records = normalizer.normalize_file(path, component, 2026, &mut warnings);
    (records, warnings)
}

#[test]
fn tagged_lines_parse_with_assumed_utc() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("evcc.log");
    fs::write(&path, "2026-03-01 10:00:00 [ERROR] contactor fault detected\n").unwrap();

    let (records, warnings) = normalize_one(&path, "evcc");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp.as_deref(), Some("2026-03-01T10:00:00Z"));
    assert_eq!(records[0].severity, Severity::Error);
    assert_eq!(records[0].message, "contactor fault detected");
    assert!(warnings.iter().any(|w| w.code == "NORMALIZE_TS_TZ_ASSUMED_UTC"));
}

#[test]
fn syslog_lines_take_the_assumed_year_and_process_component() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("syslog");
    fs::write(
        &path,
        "Mar  1 08:02:00 station evcc[123]: charging fault detected\n",
    )
    .unwrap();

    let (records, _) = normalize_one(&path, "syslog");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp.as_deref(), Some("2026-03-01T08:02:00Z"));
    assert_eq!(records[0].component, "evcc");
    assert_eq!(records[0].severity, Severity::Error);
}

#[test]
fn kernel_lines_keep_the_boot_offset_without_wall_clock() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("dmesg");
    fs::write(&path, "[    1.234567] Booting Linux on physical CPU 0x0\n").unwrap();

    let (records, _) = normalize_one(&path, "kernel");
    assert_eq!(records.len(), 1);
    assert!(records[0].timestamp.is_none());
    assert!(records[0].message.starts_with("[    1.234567]"));
}

#[test]
fn iso_prefixed_lines_parse() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("generic.log");
    fs::write(&path, "2026-03-01T10:00:00Z backend heartbeat received\n").unwrap();

    let (records, warnings) = normalize_one(&path, "generic");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp.as_deref(), Some("2026-03-01T10:00:00Z"));
    assert_eq!(records[0].severity, Severity::Info);
    assert!(warnings.is_empty(), "RFC3339 input needs no assumption: {warnings:?}");
}

#[test]
fn http_access_lines_map_status_to_severity() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("access.log");
    fs::write(
        &path,
        "127.0.0.1 - - [01/Mar/2026:10:00:00 +0000] \"GET /status HTTP/1.1\" 500 123\n",
    )
    .unwrap();

    let (records, _) = normalize_one(&path, "webserver");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp.as_deref(), Some("2026-03-01T10:00:00Z"));
    assert_eq!(records[0].severity, Severity::Error);
}

#[test]
fn broken_timestamp_keeps_the_record_with_null_timestamp() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("evcc.log");
    fs::write(
        &path,
        "2026-03-01 10:00:00 [INFO] boot complete\n\
         2026-13-99 99:99:99 [ERROR] clock corrupted but line kept\n",
    )
    .unwrap();

    let (records, warnings) = normalize_one(&path, "evcc");
    assert_eq!(records.len(), 2);
    assert!(records[1].timestamp.is_none());
    assert_eq!(records[1].severity, Severity::Error);
    assert!(warnings.iter().any(|w| w.code == "NORMALIZE_TS_UNPARSEABLE"));
}

#[test]
fn unrecognized_files_warn_instead_of_failing() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("blob.bin");
    fs::write(&path, "not a log line\nstill not one\n").unwrap();

    let (records, warnings) = normalize_one(&path, "blob");
    assert!(records.is_empty());
    assert!(warnings.iter().any(|w| w.code == "COLLECT_FILE_UNRECOGNIZED"));
}

#[test]
fn unreadable_files_warn_instead_of_failing() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("missing.log");

    let (records, warnings) = normalize_one(&path, "missing");
    assert!(records.is_empty());
    assert!(warnings.iter().any(|w| w.code == "COLLECT_FILE_UNREADABLE"));
}

#[test]
fn line_timestamps_extract_from_both_persisted_shapes() {
    use loggy_core::normalize::timestamps::extract_line_timestamp;

    // Pipe-delimited normalized shape.
    assert_eq!(
        extract_line_timestamp("2026-03-01T10:00:00Z|E|evic|contactor fault").as_deref(),
        Some("2026-03-01T10:00:00Z")
    );
    // Legacy raw shape with DATE TIME as two tokens.
    assert_eq!(
        extract_line_timestamp("2026-03-01 10:00:00 contactor fault").as_deref(),
        Some("2026-03-01T10:00:00Z")
    );
    assert!(extract_line_timestamp("no timestamp here").is_none());
}

#[test]
fn rotation_suffixes_are_stripped_from_component_names() {
    assert_eq!(component_from_path(Path::new("mqtt_client.log.1")), "mqtt_client");
    assert_eq!(component_from_path(Path::new("evcc.log")), "evcc");
    assert_eq!(component_from_path(Path::new("syslog")), "syslog");
    assert_eq!(component_from_path(Path::new("station.parsed")), "station");
}
