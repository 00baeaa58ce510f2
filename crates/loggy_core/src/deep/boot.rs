use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::IssueSeverity;
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

/// Boot-stage timing reconstructed from kernel ring-buffer offsets. Kernel
/// records carry their `[seconds.micros]` boot offset in the message text
/// because the ring buffer has no wall-clock timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootAnalysis {
    /// Highest boot offset observed, in seconds.
    pub kernel_seconds: f64,
    pub stages: Vec<BootStage>,
    pub slow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootStage {
    pub name: String,
    pub seconds: f64,
}

const SLOW_BOOT_SECONDS: f64 = 120.0;

const STAGE_MARKERS: &[(&str, &str)] = &[
    ("kernel", r"Linux version|Booting Linux"),
    ("rootfs", r"VFS: Mounted root|EXT4-fs \(.*\): mounted"),
    ("network", r"(eth\d|wlan\d).*link (becomes ready|is up)|NetworkManager.*startup complete"),
    ("application", r"(charge ?point|evcc|ocpp).*(start(ed|ing)|ready)"),
];

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("DEEP_BAD_PATTERN", "Invalid boot-stage pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

fn boot_offset(re_offset: &Regex, message: &str) -> Option<f64> {
    let caps = re_offset.captures(message)?;
    caps[1].parse().ok()
}

/// Returns None when the bundle carries no kernel ring-buffer records.
pub fn analyze(store: &EventStore, sink: &mut AnalysisSink) -> Result<Option<BootAnalysis>, AppError> {
    let re_offset = compile(r"^\[\s*(\d+\.\d+)\]")?;

    let offsets: Vec<(f64, &str)> = store
        .records()
        .iter()
        .filter_map(|rec| boot_offset(&re_offset, &rec.message).map(|o| (o, rec.message.as_str())))
        .collect();

    let Some(kernel_seconds) = offsets
        .iter()
        .map(|(o, _)| *o)
        .fold(None, |m: Option<f64>, o| Some(m.map_or(o, |m| m.max(o))))
    else {
        return Ok(None);
    };

    let mut stages: Vec<BootStage> = Vec::new();
    for (name, marker) in STAGE_MARKERS {
        let re_marker = compile(marker)?;
        if let Some((seconds, _)) = offsets.iter().find(|(_, msg)| re_marker.is_match(msg)) {
            stages.push(BootStage {
                name: name.to_string(),
                seconds: *seconds,
            });
        }
    }

    let slow = kernel_seconds > SLOW_BOOT_SECONDS;
    sink.set_int("boot_time_seconds", kernel_seconds.round() as i64);
    if slow {
        sink.push_issue(
            IssueSeverity::Medium,
            "system",
            "Slow boot",
            format!(
                "Kernel activity continued {kernel_seconds:.0}s after power-on; normal boots settle well under {SLOW_BOOT_SECONDS:.0}s."
            ),
            Vec::new(),
        );
    }

    Ok(Some(BootAnalysis {
        kernel_seconds,
        stages,
        slow,
    }))
}
