use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::IssueSeverity;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

/// Connectivity lifecycle counts plus DNS/TLS error correlation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkLifecycle {
    /// Transition counts keyed by state name
    /// (connecting/connected/disconnected/failed/reconnecting).
    pub transitions: BTreeMap<String, i64>,
    pub dns_errors: i64,
    pub tls_errors: i64,
    /// True when connection failures coincide with DNS or TLS errors,
    /// pointing at name resolution or certificates rather than the link.
    pub failure_correlated: bool,
}

const STATES: &[(&str, &str)] = &[
    ("connecting", r"\bconnecting\b|connection attempt"),
    ("connected", r"\bconnected\b|connection established"),
    ("disconnected", r"\bdisconnected\b|connection (lost|closed)"),
    ("failed", r"connect(ion)? (failed|refused|timed out)"),
    ("reconnecting", r"reconnect(ing)?\b|retrying connection"),
];

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DEEP_BAD_PATTERN", "Invalid network pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

pub fn analyze(store: &EventStore, sink: &mut AnalysisSink) -> Result<NetworkLifecycle, AppError> {
    let re_dns = compile(r"(dns|name resolution|resolve[dr]?).*(fail|error|timeout|servfail)")?;
    let re_tls = compile(r"(tls|ssl).*(handshake failed|certificate (error|verify failed)|error)")?;

    let mut compiled = Vec::with_capacity(STATES.len());
    for (state, pattern) in STATES {
        compiled.push((*state, compile(pattern)?));
    }

    let mut out = NetworkLifecycle::default();
    for rec in store.records() {
        for (state, re) in &compiled {
            if re.is_match(&rec.message) {
                *out.transitions.entry(state.to_string()).or_insert(0) += 1;
                break;
            }
        }
        if re_dns.is_match(&rec.message) {
            out.dns_errors += 1;
        }
        if re_tls.is_match(&rec.message) {
            out.tls_errors += 1;
        }
    }

    let failures = out.transitions.get("failed").copied().unwrap_or(0);
    out.failure_correlated = failures > 0 && (out.dns_errors > 0 || out.tls_errors > 0);

    sink.set_int("dns_error_count", out.dns_errors);
    sink.set_int("tls_error_count", out.tls_errors);
    sink.set_int("net_failed_count", failures);

    if out.failure_correlated {
        let hint = if out.dns_errors >= out.tls_errors {
            "name resolution"
        } else {
            "TLS/certificates"
        };
        sink.push_issue(
            IssueSeverity::Medium,
            "network",
            "Connection failures correlate with protocol errors",
            format!(
                "{failures} connection failure(s) alongside {} DNS and {} TLS error(s); \
                 investigate {hint} before blaming the physical link.",
                out.dns_errors, out.tls_errors
            ),
            Vec::new(),
        );
    }
    Ok(out)
}
