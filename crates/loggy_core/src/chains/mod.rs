use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::domain::{IssueSeverity, Severity, TimelineEvent};
use crate::error::AppError;
use crate::store::parse_canonical;

/// Role of one step inside a chain, for report rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepRole {
    /// Triggering condition.
    Cause,
    /// Intermediate propagation.
    Link,
    /// Terminal / root-cause step.
    Root,
}

/// One step specification: events match when the component contains the
/// fragment (case-insensitive, empty matches any) and the message matches the
/// pattern.
#[derive(Debug, Clone)]
pub struct ChainStepSpec {
    pub component: String,
    pub pattern: Regex,
    pub role: StepRole,
}

/// A chain template: ordered steps plus the temporal gate. Consecutive
/// matched steps further apart than `max_gap_minutes` reject the candidate as
/// coincidental.
#[derive(Debug, Clone)]
pub struct ChainTemplate {
    pub name: String,
    pub max_gap_minutes: i64,
    /// Emitted instances per template are capped to keep reports bounded.
    pub cap: usize,
    pub steps: Vec<ChainStepSpec>,
}

/// One matched step of an emitted chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainStep {
    pub role: StepRole,
    pub text: String,
    pub timestamp: Option<String>,
}

/// A fully satisfied causal chain. Severity is derived from the constituent
/// events: any Critical event makes the chain Critical, any Error makes it
/// High, otherwise Medium.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CausalChain {
    pub name: String,
    pub severity: IssueSeverity,
    pub steps: Vec<ChainStep>,
}

fn compile(template: &str, pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("CHAIN_BAD_PATTERN", "Invalid chain step pattern")
            .with_details(format!("template={template}; pattern={pattern}; err={e}"))
    })
}

type TemplateRow = (
    &'static str,
    i64,
    usize,
    &'static [(&'static str, &'static str, StepRole)],
);

/// Built-in chain catalog. Each row: name, max gap in minutes, emission cap,
/// ordered steps of (component fragment, message pattern, role).
const BUILTIN_TEMPLATES: &[TemplateRow] = &[
    (
        "Cellular loss took the charger offline",
        15,
        3,
        &[
            ("", r"(ppp|pppd).*(carrier lost|no carrier|lcp terminated)", StepRole::Cause),
            ("", r"mqtt.*(connect failed|connection refused|broker unreachable)", StepRole::Link),
            ("", r"(offline|transaction) queue|websocket.*(closed|failed)", StepRole::Root),
        ],
    ),
    (
        "Ethernet flap broke the central-system session",
        10,
        3,
        &[
            ("", r"(eth\d|ethernet).*(link (is )?down|carrier lost)", StepRole::Cause),
            ("", r"websocket.*(closed|failure|failed)", StepRole::Link),
            ("", r"(offline|transaction) queue|reconnect", StepRole::Root),
        ],
    ),
    (
        "Certificate failure blocked the cloud session",
        10,
        2,
        &[
            ("", r"(tpm|certificat).*(error|fail|expired|corrupt)", StepRole::Cause),
            ("", r"tls.*(handshake failed|setup failed|error)", StepRole::Link),
            ("", r"mqtt.*(connect failed|connection refused)|websocket.*failed", StepRole::Root),
        ],
    ),
    (
        "Thermal derating ended the charging session",
        30,
        3,
        &[
            ("", r"(over[- ]?temperature|temperature.*(critical|exceeded))", StepRole::Cause),
            ("", r"(thermal|temperature).*(derat|throttl|reduc)", StepRole::Link),
            ("", r"session.*(abort|terminated|stopped)|power delivery.*stopp", StepRole::Root),
        ],
    ),
    (
        "Missing meter blocked charging",
        10,
        2,
        &[
            ("", r"meter.*(not (found|detected)|missing|unavailable)", StepRole::Cause),
            ("", r"charging (blocked|disabled|refused)|session.*(abort|refused)", StepRole::Root),
        ],
    ),
    (
        "Memory exhaustion restarted a core service",
        10,
        3,
        &[
            ("", r"out of memory|oom-?kill", StepRole::Cause),
            ("", r"(service|unit|process).*(restart|respawn)|scheduled restart job", StepRole::Link),
            ("", r"(websocket|mqtt).*(reconnect|connected)|boot\s?notification", StepRole::Root),
        ],
    ),
    (
        "Storage fault degraded the system",
        20,
        2,
        &[
            ("", r"(i/o error|blk_update_request|buffer i/o error)", StepRole::Cause),
            ("", r"remount(ed|ing)?.*read-?only|read-?only file ?system", StepRole::Link),
            ("", r"(service|unit|process).*(fail|exit|crash)|database.*(error|locked)", StepRole::Root),
        ],
    ),
    (
        "Residual current trip opened the contactor",
        5,
        2,
        &[
            ("", r"(rcd|rcmb?|residual current).*(trip|fault|triggered)", StepRole::Cause),
            ("", r"contactor.*(open|released|off)", StepRole::Link),
            ("", r"session.*(abort|terminated|stopped)", StepRole::Root),
        ],
    ),
    (
        "Watchdog reset rebooted the station",
        20,
        2,
        &[
            ("", r"watchdog.*(timeout|expired|reset)", StepRole::Cause),
            ("", r"(system )?(reboot|restarting system|booting)", StepRole::Link),
            ("", r"boot\s?notification|(mqtt|websocket).*connected", StepRole::Root),
        ],
    ),
    (
        "DNS failure prevented backend connection",
        10,
        3,
        &[
            ("", r"(dns|name resolution|resolve).*(fail|error|timeout|servfail)", StepRole::Cause),
            ("", r"(mqtt|websocket|https?).*(connect failed|connection refused|unreachable|failed)", StepRole::Root),
        ],
    ),
    (
        "Grid fault tripped the output stage",
        5,
        2,
        &[
            ("", r"phase (imbalance|loss|failure)|missing phase", StepRole::Cause),
            ("", r"(overcurrent|over-current|overload).*(detected|tripped)", StepRole::Link),
            ("", r"contactor.*(open|fault)|session.*(abort|terminated)", StepRole::Root),
        ],
    ),
    (
        "Boot rejection left transactions queued",
        30,
        2,
        &[
            ("", r"boot\s?notification.*(rejected|pending)", StepRole::Cause),
            ("", r"(authorize|authorization).*(rejected|failed)|(offline|transaction) queue", StepRole::Root),
        ],
    ),
];

/// Compile the built-in template catalog.
pub fn default_templates() -> Result<Vec<ChainTemplate>, AppError> {
    let mut out = Vec::with_capacity(BUILTIN_TEMPLATES.len());
    for (name, max_gap_minutes, cap, steps) in BUILTIN_TEMPLATES {
        let mut specs = Vec::with_capacity(steps.len());
        for (component, pattern, role) in *steps {
            specs.push(ChainStepSpec {
                component: component.to_string(),
                pattern: compile(name, pattern)?,
                role: *role,
            });
        }
        out.push(ChainTemplate {
            name: name.to_string(),
            max_gap_minutes: *max_gap_minutes,
            cap: *cap,
            steps: specs,
        });
    }
    Ok(out)
}

fn step_matches(spec: &ChainStepSpec, event: &TimelineEvent) -> bool {
    let component_ok = spec.component.is_empty()
        || event
            .component
            .to_ascii_lowercase()
            .contains(&spec.component.to_ascii_lowercase());
    component_ok && spec.pattern.is_match(&event.message)
}

fn chain_severity(events: &[&TimelineEvent]) -> IssueSeverity {
    if events.iter().any(|e| e.severity == Severity::Critical) {
        IssueSeverity::Critical
    } else if events.iter().any(|e| e.severity == Severity::Error) {
        IssueSeverity::High
    } else {
        IssueSeverity::Medium
    }
}

/// Find all satisfied chains across the timeline.
///
/// Per template: scan once for first-step matches; from each candidate, walk
/// forward matching the remaining steps, each within `max_gap_minutes` of the
/// previously matched step. A step past the window rejects the candidate —
/// without this gate, unrelated events sharing vocabulary would be falsely
/// linked. Untimestamped events cannot satisfy the gate and are skipped.
pub fn find_chains(timeline: &[TimelineEvent], templates: &[ChainTemplate]) -> Vec<CausalChain> {
    let stamped: Vec<(&TimelineEvent, time::OffsetDateTime)> = timeline
        .iter()
        .filter_map(|e| {
            e.timestamp
                .as_deref()
                .and_then(parse_canonical)
                .map(|ts| (e, ts))
        })
        .collect();

    let mut out = Vec::new();
    for template in templates {
        let Some(first) = template.steps.first() else {
            continue;
        };
        let window = Duration::minutes(template.max_gap_minutes);
        let mut emitted = 0usize;

        for (start_idx, &(event, start_ts)) in stamped.iter().enumerate() {
            if emitted >= template.cap {
                break;
            }
            if !step_matches(first, event) {
                continue;
            }

            let mut matched: Vec<&TimelineEvent> = vec![event];
            let mut prev_ts = start_ts;
            let mut cursor = start_idx + 1;

            for spec in &template.steps[1..] {
                let mut found = false;
                while cursor < stamped.len() {
                    let (next, next_ts) = stamped[cursor];
                    if next_ts - prev_ts > window {
                        break;
                    }
                    cursor += 1;
                    if next_ts >= prev_ts && step_matches(spec, next) {
                        matched.push(next);
                        prev_ts = next_ts;
                        found = true;
                        break;
                    }
                }
                if !found {
                    matched.clear();
                    break;
                }
            }

            if matched.len() == template.steps.len() {
                let severity = chain_severity(&matched);
                out.push(CausalChain {
                    name: template.name.clone(),
                    severity,
                    steps: matched
                        .iter()
                        .zip(&template.steps)
                        .map(|(e, spec)| ChainStep {
                            role: spec.role,
                            text: e.message.clone(),
                            timestamp: e.timestamp.clone(),
                        })
                        .collect(),
                });
                emitted += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: &str, severity: Severity, component: &str, message: &str) -> TimelineEvent {
        TimelineEvent {
            timestamp: Some(ts.to_string()),
            severity,
            component: component.to_string(),
            message: message.to_string(),
        }
    }

    fn two_step_template(max_gap_minutes: i64) -> ChainTemplate {
        ChainTemplate {
            name: "link loss broke the session".to_string(),
            max_gap_minutes,
            cap: 5,
            steps: vec![
                ChainStepSpec {
                    component: String::new(),
                    pattern: Regex::new("(?i)link down").unwrap(),
                    role: StepRole::Cause,
                },
                ChainStepSpec {
                    component: String::new(),
                    pattern: Regex::new("(?i)session dropped").unwrap(),
                    role: StepRole::Root,
                },
            ],
        }
    }

    #[test]
    fn chain_emitted_inside_the_window() {
        let timeline = vec![
            event("2026-03-01T10:00:00Z", Severity::Error, "network", "eth0 link down"),
            event("2026-03-01T10:09:00Z", Severity::Error, "evic", "session dropped"),
        ];
        let chains = find_chains(&timeline, &[two_step_template(10)]);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].steps.len(), 2);
        assert_eq!(chains[0].steps[0].role, StepRole::Cause);
        assert_eq!(chains[0].severity, IssueSeverity::High);
    }

    #[test]
    fn chain_rejected_past_the_window() {
        let timeline = vec![
            event("2026-03-01T10:00:00Z", Severity::Error, "network", "eth0 link down"),
            event("2026-03-01T10:11:00Z", Severity::Error, "evic", "session dropped"),
        ];
        let chains = find_chains(&timeline, &[two_step_template(10)]);
        assert!(chains.is_empty());
    }

    #[test]
    fn emission_cap_bounds_instances() {
        let mut timeline = Vec::new();
        for i in 0..8 {
            timeline.push(event(
                &format!("2026-03-01T1{i}:00:00Z"),
                Severity::Error,
                "network",
                "eth0 link down",
            ));
            timeline.push(event(
                &format!("2026-03-01T1{i}:01:00Z"),
                Severity::Error,
                "evic",
                "session dropped",
            ));
        }
        let mut template = two_step_template(10);
        template.cap = 2;
        let chains = find_chains(&timeline, &[template]);
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn untimestamped_events_cannot_anchor_a_chain() {
        let timeline = vec![
            TimelineEvent {
                timestamp: None,
                severity: Severity::Error,
                component: "network".to_string(),
                message: "eth0 link down".to_string(),
            },
            event("2026-03-01T10:01:00Z", Severity::Error, "evic", "session dropped"),
        ];
        let chains = find_chains(&timeline, &[two_step_template(10)]);
        assert!(chains.is_empty());
    }

    #[test]
    fn builtin_catalog_compiles_and_is_large_enough() {
        let templates = default_templates().unwrap();
        assert!(templates.len() >= 10);
        for t in &templates {
            assert!(!t.steps.is_empty(), "{} has no steps", t.name);
        }
    }

    #[test]
    fn critical_step_raises_chain_severity() {
        let timeline = vec![
            event("2026-03-01T10:00:00Z", Severity::Warn, "network", "eth0 link down"),
            event("2026-03-01T10:01:00Z", Severity::Critical, "evic", "session dropped"),
        ];
        let chains = find_chains(&timeline, &[two_step_template(10)]);
        assert_eq!(chains[0].severity, IssueSeverity::Critical);
    }
}
