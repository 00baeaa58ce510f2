use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::MetricValue;

/// Letter grade buckets. Boundaries are part of the contract: A >= 90,
/// B >= 75, C >= 55, D >= 35, F below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn for_score(overall: i64) -> Self {
        match overall {
            s if s >= 90 => Grade::A,
            s if s >= 75 => Grade::B,
            s if s >= 55 => Grade::C,
            s if s >= 35 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Penalty {
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryScore {
    /// 0-100 after penalties, floored at 0.
    pub score: i64,
    /// Weight in percent; the four weights sum to 100.
    pub weight: i64,
    pub penalties: Vec<Penalty>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthScore {
    pub overall: i64,
    pub grade: Grade,
    pub categories: BTreeMap<String, CategoryScore>,
    /// Advisory forward-looking alerts, independent of the numeric score.
    pub predictions: Vec<String>,
}

pub const CATEGORY_WEIGHTS: &[(&str, i64)] = &[
    ("connectivity", 30),
    ("hardware", 25),
    ("services", 25),
    ("configuration", 20),
];

struct PenaltyRule {
    category: &'static str,
    metric: &'static str,
    /// Rule fires when the metric is at least this value.
    min: i64,
    amount: i64,
    reason: &'static str,
}

/// Tuned penalty constants. The magnitudes encode field calibration, not
/// algorithmic necessity; change them only against labelled bundles.
const PENALTY_TABLE: &[PenaltyRule] = &[
    // connectivity
    PenaltyRule { category: "connectivity", metric: "mqtt_fail_count", min: 1, amount: 10, reason: "MQTT broker connection failures" },
    PenaltyRule { category: "connectivity", metric: "mqtt_fail_count", min: 5, amount: 10, reason: "Persistent MQTT connection failures" },
    PenaltyRule { category: "connectivity", metric: "ppp_drop_count", min: 3, amount: 10, reason: "Repeated cellular link drops" },
    PenaltyRule { category: "connectivity", metric: "eth_flap_cycles", min: 3, amount: 8, reason: "Ethernet link flapping" },
    PenaltyRule { category: "connectivity", metric: "wifi_disconnect_count", min: 3, amount: 5, reason: "Repeated WiFi disconnects" },
    PenaltyRule { category: "connectivity", metric: "ocpp_boot_reject_count", min: 1, amount: 10, reason: "OCPP BootNotification rejected" },
    PenaltyRule { category: "connectivity", metric: "ocpp_ws_fail_count", min: 3, amount: 8, reason: "OCPP websocket instability" },
    PenaltyRule { category: "connectivity", metric: "dns_error_count", min: 3, amount: 5, reason: "DNS resolution errors" },
    PenaltyRule { category: "connectivity", metric: "tls_error_count", min: 1, amount: 8, reason: "TLS errors on backend connections" },
    // hardware
    PenaltyRule { category: "hardware", metric: "fs_readonly_count", min: 1, amount: 30, reason: "Filesystem fell back to read-only" },
    PenaltyRule { category: "hardware", metric: "meter_missing_count", min: 1, amount: 30, reason: "Required energy meter missing" },
    PenaltyRule { category: "hardware", metric: "secure_boot_error_count", min: 1, amount: 25, reason: "Secure boot violation" },
    PenaltyRule { category: "hardware", metric: "evic_contactor_fault_count", min: 1, amount: 25, reason: "Contactor fault" },
    PenaltyRule { category: "hardware", metric: "emmc_wear_warning_count", min: 1, amount: 20, reason: "eMMC wear approaching end of life" },
    PenaltyRule { category: "hardware", metric: "thermal_critical_count", min: 1, amount: 20, reason: "Critical over-temperature" },
    PenaltyRule { category: "hardware", metric: "rcd_trip_count", min: 1, amount: 20, reason: "Residual current device tripped" },
    PenaltyRule { category: "hardware", metric: "ground_fault_count", min: 1, amount: 20, reason: "Ground fault" },
    PenaltyRule { category: "hardware", metric: "tpm_error_count", min: 1, amount: 15, reason: "TPM errors" },
    PenaltyRule { category: "hardware", metric: "fs_corruption_count", min: 1, amount: 15, reason: "Filesystem corruption" },
    PenaltyRule { category: "hardware", metric: "estop_event_count", min: 1, amount: 15, reason: "Emergency stop activated" },
    PenaltyRule { category: "hardware", metric: "connector_imbalance", min: 1, amount: 12, reason: "Connector error imbalance" },
    PenaltyRule { category: "hardware", metric: "cert_error_count", min: 1, amount: 10, reason: "Certificate load failures" },
    PenaltyRule { category: "hardware", metric: "thermal_derate_count", min: 3, amount: 10, reason: "Recurring thermal derating" },
    PenaltyRule { category: "hardware", metric: "tamper_event_count", min: 1, amount: 10, reason: "Enclosure tamper" },
    PenaltyRule { category: "hardware", metric: "meter_stall_count", min: 1, amount: 8, reason: "Meter readings stalled" },
    // services
    PenaltyRule { category: "services", metric: "oom_kill_count", min: 1, amount: 15, reason: "Out-of-memory kills" },
    PenaltyRule { category: "services", metric: "watchdog_reset_count", min: 1, amount: 15, reason: "Watchdog resets" },
    PenaltyRule { category: "services", metric: "reboot_count", min: 3, amount: 15, reason: "Repeated reboots" },
    PenaltyRule { category: "services", metric: "process_crash_count", min: 2, amount: 10, reason: "Process crashes" },
    PenaltyRule { category: "services", metric: "service_restart_count", min: 3, amount: 10, reason: "Service restart loops" },
    PenaltyRule { category: "services", metric: "hlc_error_count", min: 3, amount: 10, reason: "Recurring HLC communication errors" },
    PenaltyRule { category: "services", metric: "evic_session_abort_count", min: 3, amount: 10, reason: "Charging sessions aborted" },
    PenaltyRule { category: "services", metric: "session_incomplete_count", min: 3, amount: 10, reason: "Sessions not reaching Finishing" },
    PenaltyRule { category: "services", metric: "error_spike_count", min: 1, amount: 5, reason: "Error rate spikes" },
    // configuration
    PenaltyRule { category: "configuration", metric: "config_warning_count", min: 1, amount: 5, reason: "Configuration warnings" },
    PenaltyRule { category: "configuration", metric: "config_warning_count", min: 3, amount: 10, reason: "Multiple configuration warnings" },
    PenaltyRule { category: "configuration", metric: "ocpp_auth_fail_count", min: 3, amount: 10, reason: "Repeated authorization failures" },
    PenaltyRule { category: "configuration", metric: "energy_zero_power_count", min: 1, amount: 10, reason: "Load management allocated zero power" },
];

fn metric(metrics: &BTreeMap<String, MetricValue>, name: &str) -> i64 {
    metrics.get(name).map(|v| v.as_int()).unwrap_or(0)
}

fn predictions(metrics: &BTreeMap<String, MetricValue>) -> Vec<String> {
    let mut out = Vec::new();
    if metric(metrics, "emmc_wear_warning_count") >= 1 {
        out.push("Storage wear is trending toward failure; schedule replacement before it becomes read-only.".to_string());
    }
    if metric(metrics, "thermal_derate_count") >= 3 {
        out.push("Recurring thermal derating suggests degrading cooling; expect hard shutdowns in hot weather.".to_string());
    }
    if metric(metrics, "eth_flap_cycles") >= 3 {
        out.push("Ethernet link quality is degrading; expect intermittent backend outages.".to_string());
    }
    if metric(metrics, "mqtt_disconnect_count") >= 5 {
        out.push("Frequent MQTT session churn; the station risks dropping offline entirely.".to_string());
    }
    if metric(metrics, "session_incomplete_count") >= 3 {
        out.push("Charging reliability is degrading; users will start reporting failed sessions.".to_string());
    }
    out
}

/// Deterministic score from the final metrics. Missing metrics read as zero;
/// an empty metrics map scores a perfect 100/A.
pub fn score(metrics: &BTreeMap<String, MetricValue>) -> HealthScore {
    let mut categories: BTreeMap<String, CategoryScore> = BTreeMap::new();

    for (name, weight) in CATEGORY_WEIGHTS {
        let mut penalties = Vec::new();
        for rule in PENALTY_TABLE {
            if rule.category == *name && metric(metrics, rule.metric) >= rule.min {
                penalties.push(Penalty {
                    amount: rule.amount,
                    reason: rule.reason.to_string(),
                });
            }
        }
        let deducted: i64 = penalties.iter().map(|p| p.amount).sum();
        categories.insert(
            name.to_string(),
            CategoryScore {
                score: (100 - deducted).clamp(0, 100),
                weight: *weight,
                penalties,
            },
        );
    }

    let weighted: i64 = categories.values().map(|c| c.score * c.weight).sum();
    // Round-half-up integer division by the weight total.
    let overall = ((weighted + 50) / 100).clamp(0, 100);

    HealthScore {
        overall,
        grade: Grade::for_score(overall),
        categories,
        predictions: predictions(metrics),
    }
}
