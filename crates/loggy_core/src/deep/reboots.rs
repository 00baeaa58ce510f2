use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{IssueSeverity, TimelineEvent};
use crate::error::AppError;
use crate::registry::AnalysisSink;

/// One reboot or crash, consolidated across kernel, watchdog, OOM and
/// service-supervisor sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebootEvent {
    pub timestamp: Option<String>,
    pub source: String,
    pub message: String,
}

const SOURCES: &[(&str, &str)] = &[
    ("kernel", r"Linux version|Booting Linux|^\[\s*0\.0"),
    ("watchdog", r"watchdog.*(timeout|expired|reset)"),
    ("oom", r"out of memory|oom-?kill"),
    ("supervisor", r"(system is )?(reboot|shutting down|restarting system)"),
];

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DEEP_BAD_PATTERN", "Invalid reboot pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

pub fn analyze(
    timeline: &[TimelineEvent],
    sink: &mut AnalysisSink,
) -> Result<Vec<RebootEvent>, AppError> {
    let mut compiled = Vec::with_capacity(SOURCES.len());
    for (source, pattern) in SOURCES {
        compiled.push((*source, compile(pattern)?));
    }

    let mut events = Vec::new();
    for event in timeline {
        for (source, re) in &compiled {
            if re.is_match(&event.message) {
                events.push(RebootEvent {
                    timestamp: event.timestamp.clone(),
                    source: source.to_string(),
                    message: event.message.clone(),
                });
                break;
            }
        }
    }

    sink.set_int("reboot_count", events.len() as i64);

    if events.len() >= 3 {
        sink.push_issue(
            IssueSeverity::High,
            "system",
            "Repeated reboots",
            format!("{} reboot/crash event(s) in the capture window.", events.len()),
            events
                .iter()
                .map(|e| {
                    format!(
                        "{} [{}] {}",
                        e.timestamp.as_deref().unwrap_or("-"),
                        e.source,
                        e.message
                    )
                })
                .collect(),
        );
    }
    Ok(events)
}
