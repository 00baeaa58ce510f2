use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// OCPP central-system protocol health: registration, transport, offline
/// queueing.
pub struct OcppDetector {
    re_boot_reject: Regex,
    re_boot_accept: Regex,
    re_ws_fail: Regex,
    re_offline_queue: Regex,
    re_auth_fail: Regex,
}

impl OcppDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_boot_reject: compile("ocpp", r"boot\s?notification.*(rejected|pending)")?,
            re_boot_accept: compile("ocpp", r"boot\s?notification.*accepted")?,
            re_ws_fail: compile(
                "ocpp",
                r"websocket.*(closed|failure|failed|handshake failed|connection refused)",
            )?,
            re_offline_queue: compile("ocpp", r"(offline|transaction) queue.*(\d+|full|persisted)")?,
            re_auth_fail: compile("ocpp", r"(authorize|authorization).*(rejected|failed|invalid)")?,
        })
    }
}

impl Detector for OcppDetector {
    fn name(&self) -> &'static str {
        "ocpp"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let rejects = store.grep(&self.re_boot_reject);
        let accepts = store.grep(&self.re_boot_accept);
        let ws_fails = store.grep(&self.re_ws_fail);
        let queued = store.grep(&self.re_offline_queue);
        let auth_fails = store.grep(&self.re_auth_fail);

        sink.set_int("ocpp_boot_reject_count", rejects.len() as i64);
        sink.set_int("ocpp_boot_accept_count", accepts.len() as i64);
        sink.set_int("ocpp_ws_fail_count", ws_fails.len() as i64);
        sink.set_int("ocpp_offline_queue_count", queued.len() as i64);
        sink.set_int("ocpp_auth_fail_count", auth_fails.len() as i64);

        for rec in rejects.iter().chain(&ws_fails).chain(&auth_fails) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "ocpp",
                rec.message.clone(),
            );
        }

        if !rejects.is_empty() {
            // A later acceptance downgrades the finding: the station did
            // eventually register.
            let (severity, outcome) = if accepts.is_empty() {
                (IssueSeverity::High, "never accepted afterwards")
            } else {
                (IssueSeverity::Medium, "accepted on a later attempt")
            };
            sink.push_issue(
                severity,
                "ocpp",
                "OCPP BootNotification rejected",
                format!(
                    "Central system rejected {} BootNotification(s); {}.",
                    rejects.len(),
                    outcome
                ),
                evidence(&rejects),
            );
        }

        if ws_fails.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "ocpp",
                "OCPP websocket instability",
                format!(
                    "{} websocket failure(s) against the central system.",
                    ws_fails.len()
                ),
                evidence(&ws_fails),
            );
        }

        if !queued.is_empty() {
            sink.push_issue(
                IssueSeverity::Low,
                "ocpp",
                "Transactions queued offline",
                format!(
                    "{} offline-queue event(s); billing records were delayed, not lost.",
                    queued.len()
                ),
                evidence(&queued),
            );
        }

        if auth_fails.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "ocpp",
                "Repeated authorization failures",
                format!("{} failed authorize request(s).", auth_fails.len()),
                evidence(&auth_fails),
            );
        }
        Ok(())
    }
}
