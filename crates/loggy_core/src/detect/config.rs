use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::{CollectionWarning, IssueSeverity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::Detector;

/// `.properties` key=value validation. Works on the config files handed to
/// the run, not on the event store.
pub struct ConfigValidationDetector {
    config_files: Vec<PathBuf>,
}

impl ConfigValidationDetector {
    pub fn new(config_files: Vec<PathBuf>) -> Self {
        Self { config_files }
    }

    fn check_file(&self, path: &PathBuf, findings: &mut Vec<String>, sink: &mut AnalysisSink) {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                sink.push_warning(
                    CollectionWarning::new("COLLECT_FILE_UNREADABLE", "Config file unreadable")
                        .with_details(format!("{}: {e}", path.display())),
                );
                return;
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                findings.push(format!("{name}:{line_no}: not a key=value line: {trimmed}"));
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                findings.push(format!("{name}:{line_no}: empty key"));
                continue;
            }
            if let Some(first) = seen.insert(key.to_string(), line_no) {
                findings.push(format!(
                    "{name}:{line_no}: duplicate key '{key}' (first set at line {first})"
                ));
            }
            let lower = key.to_ascii_lowercase();
            let endpoint_like = lower.contains("url")
                || lower.contains("host")
                || lower.contains("endpoint")
                || lower.contains("broker");
            if endpoint_like && value.is_empty() {
                findings.push(format!("{name}:{line_no}: endpoint key '{key}' has no value"));
            }
            if value.contains("CHANGEME") || value.contains("TODO") || value == "<placeholder>" {
                findings.push(format!(
                    "{name}:{line_no}: key '{key}' still holds a placeholder value"
                ));
            }
        }
    }
}

impl Detector for ConfigValidationDetector {
    fn name(&self) -> &'static str {
        "config"
    }

    fn run(&self, _store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let mut findings = Vec::new();
        for path in &self.config_files {
            self.check_file(path, &mut findings, sink);
        }

        sink.set_int("config_warning_count", findings.len() as i64);

        if !findings.is_empty() {
            // One finding is a nit; three or more suggests the unit was
            // provisioned from a broken template.
            let severity = if findings.len() >= 3 {
                IssueSeverity::Medium
            } else {
                IssueSeverity::Low
            };
            let count = findings.len();
            sink.push_issue(
                severity,
                "config",
                "Configuration validation warnings",
                format!("{count} problem(s) found in the provided configuration files."),
                findings,
            );
        }
        Ok(())
    }
}
