use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use loggy_core::domain::MetricValue;
use loggy_core::score::{score, Grade, HealthScore};

fn metrics(entries: &[(&str, i64)]) -> BTreeMap<String, MetricValue> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), MetricValue::Int(*v)))
        .collect()
}

#[test]
fn health_score_round_trips_through_json() {
    let health = score(&metrics(&[
        ("mqtt_fail_count", 2),
        ("eth_flap_cycles", 4),
        ("connector_imbalance", 1),
        ("emmc_wear_warning_count", 1),
        ("config_warning_count", 3),
    ]));

    let json = serde_json::to_string(&health).expect("serialize");
    let back: HealthScore = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(health, back);
}

#[test]
fn round_trip_preserves_penalty_attribution() {
    let health = score(&metrics(&[("fs_readonly_count", 1)]));
    let json = serde_json::to_value(&health).expect("serialize");
    let back: HealthScore = serde_json::from_value(json).expect("deserialize");

    assert_eq!(back.overall, health.overall);
    assert_eq!(back.grade, health.grade);
    assert_eq!(
        back.categories["hardware"].penalties,
        health.categories["hardware"].penalties
    );
}

#[test]
fn perfect_station_round_trips_as_grade_a() {
    let health = score(&BTreeMap::new());
    assert_eq!(health.overall, 100);
    assert_eq!(health.grade, Grade::A);
    let json = serde_json::to_string(&health).expect("serialize");
    let back: HealthScore = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.grade, Grade::A);
}
