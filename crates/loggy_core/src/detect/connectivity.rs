use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Cloud/MQTT connectivity: broker reachability and session churn.
pub struct CloudMqttDetector {
    re_fail: Regex,
    re_ok: Regex,
    re_disconnect: Regex,
}

impl CloudMqttDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_fail: compile(
                "cloud_mqtt",
                r"mqtt.*(connection refused|connect failed|broker unreachable|connack.*refused|tls handshake failed)",
            )?,
            re_ok: compile("cloud_mqtt", r"mqtt.*(connected|connack.*accepted|session established)")?,
            re_disconnect: compile("cloud_mqtt", r"mqtt.*(disconnected|connection lost)")?,
        })
    }
}

impl Detector for CloudMqttDetector {
    fn name(&self) -> &'static str {
        "cloud_mqtt"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let fails = store.grep(&self.re_fail);
        let oks = store.grep(&self.re_ok);
        let disconnects = store.grep(&self.re_disconnect);

        sink.set_int("mqtt_fail_count", fails.len() as i64);
        sink.set_int("mqtt_ok_count", oks.len() as i64);
        sink.set_int("mqtt_disconnect_count", disconnects.len() as i64);

        for rec in &fails {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "cloud",
                rec.message.clone(),
            );
        }

        if !fails.is_empty() {
            // No successful connect anywhere in the bundle means the charger
            // was fully offline, not flapping.
            let severity = if oks.is_empty() {
                IssueSeverity::High
            } else {
                IssueSeverity::Medium
            };
            sink.push_issue(
                severity,
                "cloud",
                "MQTT broker connection failures",
                format!(
                    "{} failed MQTT connection attempt(s) against {} successful connect(s).",
                    fails.len(),
                    oks.len()
                ),
                evidence(&fails),
            );
        }
        Ok(())
    }
}

/// PPP/cellular uplink health.
pub struct CellularDetector {
    re_drop: Regex,
    re_signal: Regex,
}

impl CellularDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_drop: compile(
                "cellular",
                r"(ppp|pppd).*(lcp terminated|carrier lost|no carrier|connection terminated|modem hangup)",
            )?,
            re_signal: compile("cellular", r"(signal (quality|strength)).*(low|poor|weak)|rssi.*-1[0-2]\d")?,
        })
    }
}

impl Detector for CellularDetector {
    fn name(&self) -> &'static str {
        "cellular"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let drops = store.grep(&self.re_drop);
        let weak = store.grep(&self.re_signal);

        sink.set_int("ppp_drop_count", drops.len() as i64);
        sink.set_int("cellular_weak_signal_count", weak.len() as i64);

        for rec in &drops {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "cellular",
                rec.message.clone(),
            );
        }

        if drops.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "cellular",
                "Repeated cellular link drops",
                format!("PPP session dropped {} time(s) during the capture.", drops.len()),
                evidence(&drops),
            );
        }
        if !weak.is_empty() {
            sink.push_issue(
                IssueSeverity::Low,
                "cellular",
                "Weak cellular signal reported",
                format!("{} weak-signal report(s); link drops may be radio-related.", weak.len()),
                evidence(&weak),
            );
        }
        Ok(())
    }
}

/// Ethernet/WiFi link state: flap cycle counting (a cycle is one link-down
/// followed by the next link-up on the same interface class).
pub struct LinkStateDetector {
    re_eth_down: Regex,
    re_eth_up: Regex,
    re_wifi_drop: Regex,
}

impl LinkStateDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_eth_down: compile("link_state", r"(eth\d|ethernet).*(link (is )?down|carrier lost)")?,
            re_eth_up: compile("link_state", r"(eth\d|ethernet).*link (is )?up")?,
            re_wifi_drop: compile("link_state", r"(wlan\d|wifi).*(disconnect|deauth|link down)")?,
        })
    }
}

impl Detector for LinkStateDetector {
    fn name(&self) -> &'static str {
        "link_state"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let mut cycles = 0i64;
        let mut pending_down = false;
        let mut downs = Vec::new();

        for rec in store.records() {
            if self.re_eth_down.is_match(&rec.message) {
                pending_down = true;
                downs.push(rec);
                sink.push_timeline(
                    rec.timestamp.clone(),
                    Severity::Warn,
                    "network",
                    rec.message.clone(),
                );
            } else if self.re_eth_up.is_match(&rec.message) && pending_down {
                cycles += 1;
                pending_down = false;
            }
        }

        let wifi_drops = store.grep(&self.re_wifi_drop);

        sink.set_int("eth_flap_cycles", cycles);
        sink.set_int("wifi_disconnect_count", wifi_drops.len() as i64);

        if cycles >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "network",
                "Ethernet link flapping",
                format!("{cycles} down/up cycle(s); check cabling and switch port."),
                evidence(&downs),
            );
        }
        if wifi_drops.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Low,
                "network",
                "Repeated WiFi disconnects",
                format!("{} WiFi disconnect(s) during the capture.", wifi_drops.len()),
                evidence(&wifi_drops),
            );
        }
        Ok(())
    }
}
