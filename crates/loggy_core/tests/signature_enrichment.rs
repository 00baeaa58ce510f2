use loggy_core::domain::{Issue, IssueSeverity};
use loggy_core::signatures::{parse_error_registry, parse_signature_table, SignatureDb};

fn issue_with_evidence(evidence: &str) -> Issue {
    Issue::new(
        IssueSeverity::High,
        "cloud",
        "MQTT broker connection failures",
        "3 failed MQTT connection attempt(s) against 0 successful connect(s).",
        vec![evidence.to_string()],
    )
}

#[test]
fn table_order_encodes_precedence() {
    let table = "mqtt.*connection refused\tcloud\tHIGH\tBroker refused\tBroker rejects this station\tCheck credentials\t\n\
                 mqtt\tcloud\tLOW\tGeneric MQTT noise\tAnything MQTT\tIgnore\t\n";
    let mut warnings = Vec::new();
    let signatures = parse_signature_table(table, &mut warnings);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(signatures.len(), 2);

    let db = SignatureDb {
        signatures,
        registry: Vec::new(),
    };
    let hit = db
        .match_line("2026-03-01T10:00:00Z mqtt connect: connection refused")
        .expect("match");
    assert_eq!(hit.title, "Broker refused");
}

#[test]
fn malformed_signature_rows_are_skipped_with_warnings() {
    let table = "only\tthree\tfields\n\
                 mqtt\tcloud\tHIGH\tTitle\tCause\tFix\thttps://kb.example/1\n";
    let mut warnings = Vec::new();
    let signatures = parse_signature_table(table, &mut warnings);
    assert_eq!(signatures.len(), 1);
    assert!(warnings.iter().any(|w| w.code == "SIGNATURE_ROW_TOO_SHORT"));
}

#[test]
fn registry_columns_resolve_by_header_name() {
    let canonical = "module\tcode\terrorType\tname\tdescription\ttroubleshootingSteps\tonSiteServiceRequired\tseverity\n\
                     evic\tE-1042\thardware\tContactorFeedback\tContactor feedback mismatch\tInspect wiring\ttrue\tHIGH\n";
    let reordered = "severity\tname\tmodule\ttroubleshootingSteps\tcode\tdescription\tonSiteServiceRequired\terrorType\n\
                     HIGH\tContactorFeedback\tevic\tInspect wiring\tE-1042\tContactor feedback mismatch\ttrue\thardware\n";

    let mut warnings = Vec::new();
    let a = parse_error_registry(canonical, &mut warnings);
    let b = parse_error_registry(reordered, &mut warnings);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].code, b[0].code);
    assert_eq!(a[0].name, b[0].name);
    assert_eq!(a[0].troubleshooting, b[0].troubleshooting);
    assert_eq!(a[0].onsite_required, b[0].onsite_required);
    assert_eq!(a[0].severity, b[0].severity);
}

#[test]
fn enrichment_is_additive_and_sets_the_onsite_flag() {
    let registry_text = "module\tcode\terrorType\tname\tdescription\ttroubleshootingSteps\tonSiteServiceRequired\tseverity\n\
                         evic\tE-1042\thardware\tContactorFeedback\tContactor feedback mismatch\tInspect the feedback wiring\ttrue\tHIGH\n";
    let mut warnings = Vec::new();
    let db = SignatureDb {
        signatures: Vec::new(),
        registry: parse_error_registry(registry_text, &mut warnings),
    };

    let mut issues = vec![Issue::new(
        IssueSeverity::High,
        "evic",
        "Charge point entered Faulted state",
        "1 transition(s) into the Faulted state.",
        vec!["2026-03-01T10:00:00Z fault E-1042 raised".to_string()],
    )];
    let original_description = issues[0].description.clone();
    let original_fingerprint = issues[0].fingerprint.clone();

    let enriched = db.enrich_issues(&mut issues);
    assert_eq!(enriched, 1);
    assert!(issues[0].description.starts_with(&original_description));
    assert!(issues[0].description.contains("Inspect the feedback wiring"));
    assert!(issues[0].description.contains("On-site service required."));
    assert!(issues[0].onsite_required);
    assert_eq!(issues[0].fingerprint, original_fingerprint);
}

#[test]
fn builtin_signatures_enrich_mqtt_failures() {
    let db = SignatureDb::builtin().expect("builtins");
    let mut issues = vec![issue_with_evidence(
        "2026-03-01T10:00:00Z mqtt connect failed: broker unreachable",
    )];
    let enriched = db.enrich_issues(&mut issues);
    assert_eq!(enriched, 1);
    assert!(issues[0].description.contains("Root cause:"));
}

#[test]
fn no_match_leaves_the_issue_untouched() {
    let db = SignatureDb::builtin().expect("builtins");
    let mut issues = vec![Issue::new(
        IssueSeverity::Low,
        "misc",
        "Completely novel condition",
        "Something no signature knows about.",
        vec!["2026-03-01T10:00:00Z a very private fault".to_string()],
    )];
    let before = issues[0].clone();
    let enriched = db.enrich_issues(&mut issues);
    assert_eq!(enriched, 0);
    assert_eq!(issues[0], before);
}
