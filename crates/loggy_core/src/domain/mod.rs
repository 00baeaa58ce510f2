use serde::{Deserialize, Serialize};

/// Normalized per-line severity.
///
/// Notes:
/// - Single-letter codes (`E/W/I/C/N`) are the wire form used by the
///   pipe-delimited normalized line shape `TS|S|component|message`.
/// - Lines whose severity cannot be determined are `Unknown`, never dropped:
///   detectors key primarily on message content, not severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
    Unknown,
}

impl Severity {
    pub fn letter(&self) -> char {
        match self {
            Severity::Error => 'E',
            Severity::Warn => 'W',
            Severity::Info => 'I',
            Severity::Critical => 'C',
            Severity::Unknown => 'N',
        }
    }

    pub fn from_letter(c: char) -> Self {
        match c {
            'E' => Severity::Error,
            'W' => Severity::Warn,
            'I' => Severity::Info,
            'C' => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    /// Map a severity token as it appears in raw logs (`ERROR`, `warn`, `crit`...).
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "ERROR" | "ERR" | "E" => Severity::Error,
            "WARN" | "WARNING" | "W" => Severity::Warn,
            "INFO" | "NOTICE" | "I" => Severity::Info,
            "CRITICAL" | "CRIT" | "FATAL" | "EMERG" | "ALERT" | "C" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

/// Canonical normalized log record. Created by the normalizer, immutable
/// thereafter, owned by the event store for the lifetime of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    /// Canonical RFC3339 UTC timestamp, millisecond precision, if parseable.
    pub timestamp: Option<String>,
    pub severity: Severity,
    pub component: String,
    pub message: String,
    pub source_file: String,
    pub source_line: usize,
}

/// Issue severity as surfaced in reports. Fixed at creation, never mutated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Critical => "CRITICAL",
            IssueSeverity::High => "HIGH",
            IssueSeverity::Medium => "MEDIUM",
            IssueSeverity::Low => "LOW",
        }
    }

    /// Registry severities are free text; unknown values default to Medium,
    /// matching the registry loader contract.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => IssueSeverity::Critical,
            "HIGH" => IssueSeverity::High,
            "LOW" => IssueSeverity::Low,
            _ => IssueSeverity::Medium,
        }
    }
}

/// Discovered issue. Produced by exactly one detector invocation; enrichment
/// appends remediation text but never changes identity (fingerprint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub component: String,
    pub title: String,
    pub description: String,
    /// Stable identity: sha256 of normalized title + component + first evidence line.
    pub fingerprint: String,
    /// Bounded sample of supporting lines (full evidence stays in the event store).
    pub evidence: Vec<String>,
    /// Set by signature enrichment when the matched remediation requires a site visit.
    pub onsite_required: bool,
}

fn normalize_title_for_fingerprint(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_lowercase()
}

impl Issue {
    pub fn new(
        severity: IssueSeverity,
        component: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        evidence: Vec<String>,
    ) -> Self {
        use sha2::{Digest, Sha256};
        let component = component.into();
        let title = title.into();
        let payload = format!(
            "title={}|component={}|first_evidence={}",
            normalize_title_for_fingerprint(&title),
            component,
            evidence.first().map(String::as_str).unwrap_or("")
        );
        let fingerprint = hex::encode(Sha256::digest(payload.as_bytes()));
        Self {
            severity,
            component,
            title,
            description: description.into(),
            fingerprint,
            evidence,
            onsite_required: false,
        }
    }
}

/// Chronological event used by the causal chain engine and report timelines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub timestamp: Option<String>,
    pub severity: Severity,
    pub component: String,
    pub message: String,
}

/// Flat metric value: cumulative counts, 0/1 flags, or categorical strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Text(String),
}

impl MetricValue {
    pub fn as_int(&self) -> i64 {
        match self {
            MetricValue::Int(v) => *v,
            MetricValue::Text(_) => 0,
        }
    }
}

/// Non-fatal anomaly surfaced during collection, normalization, or detection.
/// These are data, not errors: the run always continues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl CollectionWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// How many supporting lines each issue keeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EvidenceLevel {
    Min,
    Standard,
    Full,
}

impl EvidenceLevel {
    pub fn cap(&self) -> usize {
        match self {
            EvidenceLevel::Min => 1,
            EvidenceLevel::Standard => 3,
            EvidenceLevel::Full => 10,
        }
    }
}

impl Default for EvidenceLevel {
    fn default() -> Self {
        EvidenceLevel::Standard
    }
}
