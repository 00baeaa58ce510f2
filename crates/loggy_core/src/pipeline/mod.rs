use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::chains::{self, CausalChain};
use crate::deep::{self, DeepAnalysis};
use crate::detect;
use crate::domain::{
    CollectionWarning, EvidenceLevel, Issue, LogRecord, MetricValue, TimelineEvent,
};
use crate::error::AppError;
use crate::normalize::{component_from_path, Normalizer};
use crate::registry::AnalysisSink;
use crate::score::{self, HealthScore};
use crate::signatures::SignatureDb;
use crate::store::{parse_canonical, EventStore};

/// Per-run knobs. Everything has a sensible default; tests pin
/// `assumed_year` for determinism.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub evidence_level: EvidenceLevel,
    /// External signature table (TSV), appended after the built-ins.
    pub signature_table: Option<PathBuf>,
    /// External error-code registry (TSV with header row).
    pub error_registry: Option<PathBuf>,
    /// Extra `.properties` files beyond those found in the bundle.
    pub config_files: Vec<PathBuf>,
    /// Year assumed for year-less syslog timestamps.
    pub assumed_year: i32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            evidence_level: EvidenceLevel::Standard,
            signature_table: None,
            error_registry: None,
            config_files: Vec::new(),
            assumed_year: OffsetDateTime::now_utc().year(),
        }
    }
}

/// Everything one analysis run produces. Consumed by the external report
/// generators; serde round-trippable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub device_id: Option<String>,
    pub metrics: BTreeMap<String, MetricValue>,
    pub issues: Vec<Issue>,
    pub timeline: Vec<TimelineEvent>,
    pub chains: Vec<CausalChain>,
    pub deep: DeepAnalysis,
    pub health: HealthScore,
    pub warnings: Vec<CollectionWarning>,
}

fn device_id_pattern() -> Result<Regex, AppError> {
    Regex::new(r"(?i)\b(?:device|serial)(?:\s*(?:id|number|no\.?))?\s*[:=]\s*([A-Za-z0-9][A-Za-z0-9._-]{3,})")
        .map_err(|e| {
            AppError::new("PIPELINE_BAD_PATTERN", "Invalid device-id pattern")
                .with_details(e.to_string())
        })
}

fn extract_device_id(records: &[LogRecord]) -> Result<Option<String>, AppError> {
    let re = device_id_pattern()?;
    for rec in records {
        if let Some(caps) = re.captures(&rec.message) {
            return Ok(Some(caps[1].to_string()));
        }
    }
    Ok(None)
}

fn sort_timeline(mut timeline: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    // Ordering is a read-side concern: stamped events ascending, unstamped
    // events after in emission order.
    let unstamped: Vec<TimelineEvent> = timeline
        .iter()
        .filter(|e| e.timestamp.is_none())
        .cloned()
        .collect();
    timeline.retain(|e| e.timestamp.is_some());
    timeline.sort_by_key(|e| e.timestamp.as_deref().and_then(parse_canonical));
    timeline.extend(unstamped);
    timeline
}

/// One full analysis run over an extracted bundle directory.
///
/// Only a total absence of usable input is fatal; every other problem
/// degrades into warnings and the report is still produced.
pub fn analyze_bundle(dir: &Path, options: &AnalysisOptions) -> Result<AnalysisReport, AppError> {
    let normalizer = Normalizer::new()?;
    let mut warnings: Vec<CollectionWarning> = Vec::new();

    let mut paths: Vec<PathBuf> = Vec::new();
    let mut config_files = options.config_files.clone();
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::new("COLLECT_DIR_UNREADABLE", "Cannot read bundle directory")
            .with_details(format!("path={}; err={e}", dir.display()))
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::new("COLLECT_DIR_UNREADABLE", "Cannot read bundle directory entry")
                .with_details(format!("path={}; err={e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().is_some_and(|e| e == "properties") {
            config_files.push(path);
        } else {
            paths.push(path);
        }
    }
    paths.sort();
    config_files.sort();

    let mut records: Vec<LogRecord> = Vec::new();
    let mut recognized_files = 0usize;
    for path in &paths {
        let component = component_from_path(path);
        let file_records =
            normalizer.normalize_file(path, &component, options.assumed_year, &mut warnings);
        if !file_records.is_empty() {
            recognized_files += 1;
        }
        records.extend(file_records);
    }

    if recognized_files == 0 {
        return Err(AppError::new(
            "COLLECT_NO_INPUT",
            "No recognized log files in the bundle",
        )
        .with_details(format!("path={}", dir.display())));
    }

    let device_id = extract_device_id(&records)?;
    let store = EventStore::from_records(records);

    let db = SignatureDb::load(
        options.signature_table.as_deref(),
        options.error_registry.as_deref(),
        &mut warnings,
    )?;

    let mut sink = AnalysisSink::new(options.evidence_level);
    for warning in warnings {
        sink.push_warning(warning);
    }
    if let Some(ref id) = device_id {
        sink.set_text("device_id", id.clone());
    }

    let detectors = detect::default_detectors(db.registry.clone(), config_files)?;
    detect::run_detectors(&detectors, &store, &mut sink);

    let templates = chains::default_templates()?;
    let chains = chains::find_chains(&store.timeline(), &templates);

    let deep = deep::run_deep_analysis(&store, &mut sink);

    let enriched = db.enrich_issues(sink.issues_mut());
    sink.set_int("signature_enriched_count", enriched as i64);

    let health = score::score(sink.metrics());
    sink.set_int("health_score", health.overall);
    sink.set_text("health_grade", health.grade.as_str());

    let (metrics, issues, timeline, warnings) = sink.into_parts();

    Ok(AnalysisReport {
        device_id,
        metrics,
        issues,
        timeline: sort_timeline(timeline),
        chains,
        deep,
        health,
        warnings,
    })
}
