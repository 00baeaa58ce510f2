use std::collections::BTreeMap;

use crate::domain::{
    CollectionWarning, EvidenceLevel, Issue, IssueSeverity, MetricValue, Severity, TimelineEvent,
};

/// Shared accumulator every detector writes into.
///
/// Single-writer-per-key discipline: each metric name is owned by exactly one
/// detector, so no locking is needed. The sink is passed `&mut` into each
/// detector call (explicit context object, no hidden globals). If detectors
/// are ever parallelized, give each its own sink and merge afterwards.
#[derive(Debug)]
pub struct AnalysisSink {
    metrics: BTreeMap<String, MetricValue>,
    issues: Vec<Issue>,
    timeline: Vec<TimelineEvent>,
    warnings: Vec<CollectionWarning>,
    evidence_level: EvidenceLevel,
}

impl AnalysisSink {
    pub fn new(evidence_level: EvidenceLevel) -> Self {
        Self {
            metrics: BTreeMap::new(),
            issues: Vec::new(),
            timeline: Vec::new(),
            warnings: Vec::new(),
            evidence_level,
        }
    }

    pub fn evidence_level(&self) -> EvidenceLevel {
        self.evidence_level
    }

    /// Cap an evidence sample at the configured level. Full evidence stays
    /// recoverable from the event store.
    pub fn cap_evidence(&self, mut evidence: Vec<String>) -> Vec<String> {
        evidence.truncate(self.evidence_level.cap());
        evidence
    }

    pub fn increment(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &str, amount: i64) {
        let next = self.get_int(name) + amount;
        self.metrics.insert(name.to_string(), MetricValue::Int(next));
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.metrics.insert(name.to_string(), MetricValue::Int(value));
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.metrics
            .insert(name.to_string(), MetricValue::Text(value.into()));
    }

    /// Missing metrics read as zero; scoring and detectors never error on
    /// absent signals.
    pub fn get_int(&self, name: &str) -> i64 {
        self.metrics.get(name).map(|v| v.as_int()).unwrap_or(0)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        match self.metrics.get(name) {
            Some(MetricValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn push_issue(
        &mut self,
        severity: IssueSeverity,
        component: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        evidence: Vec<String>,
    ) {
        let evidence = self.cap_evidence(evidence);
        self.issues
            .push(Issue::new(severity, component, title, description, evidence));
    }

    pub fn push_timeline(
        &mut self,
        timestamp: Option<String>,
        severity: Severity,
        component: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.timeline.push(TimelineEvent {
            timestamp,
            severity,
            component: component.into(),
            message: message.into(),
        });
    }

    pub fn push_warning(&mut self, warning: CollectionWarning) {
        self.warnings.push(warning);
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn issues_mut(&mut self) -> &mut [Issue] {
        &mut self.issues
    }

    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    pub fn warnings(&self) -> &[CollectionWarning] {
        &self.warnings
    }

    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<String, MetricValue>,
        Vec<Issue>,
        Vec<TimelineEvent>,
        Vec<CollectionWarning>,
    ) {
        (self.metrics, self.issues, self.timeline, self.warnings)
    }
}

impl Default for AnalysisSink {
    fn default() -> Self {
        Self::new(EvidenceLevel::Standard)
    }
}
