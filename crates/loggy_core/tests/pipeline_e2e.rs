use std::fs;

use tempfile::tempdir;

use loggy_core::demo::write_demo_bundle;
use loggy_core::pipeline::{analyze_bundle, AnalysisOptions, AnalysisReport};
use loggy_core::score::Grade;

fn options() -> AnalysisOptions {
    AnalysisOptions {
        assumed_year: 2026,
        ..AnalysisOptions::default()
    }
}

#[test]
fn demo_bundle_yields_the_expected_connectivity_picture() {
    let tmp = tempdir().unwrap();
    write_demo_bundle(tmp.path()).expect("demo bundle");

    let report = analyze_bundle(tmp.path(), &options()).expect("analysis");

    assert_eq!(report.metrics["mqtt_fail_count"].as_int(), 2);
    assert_eq!(report.metrics["mqtt_ok_count"].as_int(), 1);
    assert_eq!(report.metrics["eth_flap_cycles"].as_int(), 4);
    assert!(
        report.issues.iter().any(|i| i.title.contains("BootNotification")),
        "expected an OCPP issue, got: {:?}",
        report.issues.iter().map(|i| &i.title).collect::<Vec<_>>()
    );
    assert!(report.health.categories["connectivity"].score < 100);
    assert_eq!(report.device_id.as_deref(), Some("DEMO-4711A"));
    assert_eq!(
        report.metrics["health_grade"],
        loggy_core::domain::MetricValue::Text(report.health.grade.as_str().to_string())
    );
}

#[test]
fn report_round_trips_through_json() {
    let tmp = tempdir().unwrap();
    write_demo_bundle(tmp.path()).expect("demo bundle");

    let report = analyze_bundle(tmp.path(), &options()).expect("analysis");
    let json = serde_json::to_string_pretty(&report).expect("serialize");
    let back: AnalysisReport = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(report, back);
}

#[test]
fn quiet_bundle_scores_a_perfect_grade() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("evcc.log"),
        "2026-03-01 10:00:00 [INFO] heartbeat ok\n\
         2026-03-01 10:05:00 [INFO] periodic self check passed\n",
    )
    .unwrap();

    let report = analyze_bundle(tmp.path(), &options()).expect("analysis");
    assert!(report.issues.is_empty(), "issues: {:?}", report.issues);
    assert!(report.timeline.is_empty());
    assert!(report.chains.is_empty());
    assert_eq!(report.health.overall, 100);
    assert_eq!(report.health.grade, Grade::A);
}

#[test]
fn empty_bundle_is_the_only_fatal_case() {
    let tmp = tempdir().unwrap();
    let err = analyze_bundle(tmp.path(), &options()).expect_err("must fail");
    assert_eq!(err.code, "COLLECT_NO_INPUT");
}

#[test]
fn unrecognized_files_degrade_to_warnings_when_any_input_remains() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("blob.bin"), "binary-ish noise\nmore noise\n").unwrap();
    fs::write(
        tmp.path().join("evcc.log"),
        "2026-03-01 10:00:00 [INFO] heartbeat ok\n",
    )
    .unwrap();

    let report = analyze_bundle(tmp.path(), &options()).expect("analysis");
    assert!(report
        .warnings
        .iter()
        .any(|w| w.code == "COLLECT_FILE_UNRECOGNIZED"));
}

#[test]
fn causal_chain_emerges_from_a_correlated_bundle() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("network.log"),
        "2026-03-01 10:00:00 [ERROR] eth0: link is down\n\
         2026-03-01 10:03:00 [ERROR] websocket connection to csms failed\n\
         2026-03-01 10:04:00 [WARN] transaction queue persisted 3 entries\n",
    )
    .unwrap();

    let report = analyze_bundle(tmp.path(), &options()).expect("analysis");
    assert!(
        report
            .chains
            .iter()
            .any(|c| c.name.contains("Ethernet flap")),
        "chains: {:?}",
        report.chains.iter().map(|c| &c.name).collect::<Vec<_>>()
    );
}
