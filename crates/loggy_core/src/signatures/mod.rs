use std::fs;
use std::path::Path;

use regex::Regex;

use crate::domain::{CollectionWarning, Issue, IssueSeverity};
use crate::error::AppError;

/// One row of the curated signature table:
/// `pattern<TAB>component<TAB>severity<TAB>title<TAB>root_cause<TAB>fix<TAB>kb_url`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub pattern: Regex,
    pub component: String,
    pub severity: IssueSeverity,
    pub title: String,
    pub root_cause: String,
    pub fix: String,
    pub kb_url: String,
}

/// One row of the official error-code registry. Columns are resolved by
/// header name so reordered exports still load.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub module: String,
    pub code: String,
    pub error_type: String,
    pub name: String,
    pub description: String,
    pub troubleshooting: String,
    pub onsite_required: bool,
    pub severity: IssueSeverity,
}

/// Signature table + error registry, with first-match-wins lookup.
///
/// Table order is significant: more specific patterns must precede general
/// ones, so the table is an ordered list scanned linearly — never a map.
#[derive(Debug, Default)]
pub struct SignatureDb {
    pub signatures: Vec<Signature>,
    pub registry: Vec<RegistryEntry>,
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        AppError::new("SIGNATURE_BAD_PATTERN", "Invalid signature pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

/// Curated built-in signatures, most specific first.
const BUILTIN_SIGNATURES: &[(&str, &str, &str, &str, &str, &str)] = &[
    (
        r"certificate (load|verification) failed.*tpm",
        "security",
        "CRITICAL",
        "TPM-backed certificate failure",
        "TPM cannot unseal the charger identity certificate",
        "Re-provision device certificates; if TPM errors persist the mainboard needs replacement",
    ),
    (
        r"mqtt.*(connection refused|connect failed|broker unreachable)",
        "cloud",
        "HIGH",
        "Cloud MQTT broker unreachable",
        "Charger cannot reach the backend broker (network outage or broker-side rejection)",
        "Verify uplink connectivity and broker credentials; check APN if on cellular",
    ),
    (
        r"boot\s?notification.*rejected",
        "ocpp",
        "HIGH",
        "OCPP BootNotification rejected",
        "Central system refused registration (unknown station or bad configuration)",
        "Confirm chargepoint identity in the CSMS and re-send BootNotification",
    ),
    (
        r"websocket.*(closed|failure|handshake failed)",
        "ocpp",
        "MEDIUM",
        "OCPP websocket failure",
        "Transport to the central system dropped",
        "Check TLS configuration and central-system endpoint availability",
    ),
    (
        r"emmc.*(wear|life\s?time|erase block)",
        "storage",
        "HIGH",
        "eMMC wear warning",
        "Flash wear indicator past threshold",
        "Plan storage replacement; reduce log verbosity to slow wear",
    ),
    (
        r"remount.*read-?only|read-?only filesystem",
        "storage",
        "CRITICAL",
        "Filesystem fell back to read-only",
        "Kernel remounted a corrupted filesystem read-only",
        "Run filesystem check on site; persistent corruption indicates failing eMMC",
    ),
    (
        r"ppp.*(lcp terminated|carrier lost|no carrier)",
        "cellular",
        "MEDIUM",
        "Cellular link dropped",
        "PPP session lost the carrier",
        "Check antenna, signal quality and SIM status",
    ),
    (
        r"required meter.*(missing|not found)",
        "meter",
        "CRITICAL",
        "Required meter missing",
        "Billing-grade meter did not enumerate",
        "On-site check of meter wiring and RS-485 bus required",
    ),
    (
        r"meter.*(read stall|no response|timeout)",
        "meter",
        "MEDIUM",
        "Meter read stall",
        "Meter stopped answering periodic reads",
        "Power-cycle the meter; inspect bus wiring if it recurs",
    ),
    (
        r"over-?temperature|thermal (shutdown|derat)",
        "thermal",
        "HIGH",
        "Thermal derating active",
        "Power electronics exceeded thermal limits",
        "Check fans and ventilation clearance; verify ambient temperature",
    ),
    (
        r"lid (open|tamper)|tamper switch",
        "safety",
        "HIGH",
        "Enclosure tamper event",
        "Cabinet lid opened outside a service window",
        "Physical inspection required; review site access",
    ),
    (
        r"emergency stop|estop (pressed|active)",
        "safety",
        "CRITICAL",
        "Emergency stop engaged",
        "E-stop circuit opened",
        "On-site reset required after verifying the stop cause",
    ),
    (
        r"oom-?killer|out of memory",
        "system",
        "HIGH",
        "Out-of-memory kill",
        "A service exceeded available memory and was killed",
        "Capture memory statistics; update firmware if a known leak is fixed upstream",
    ),
    (
        r"watchdog.*(reset|expired|timeout)",
        "system",
        "HIGH",
        "Watchdog reset",
        "A supervised service stopped feeding the watchdog",
        "Inspect the service crash loop preceding the reset",
    ),
    (
        r"(connection|link) (down|lost)",
        "network",
        "LOW",
        "Link interruption",
        "Transient loss of a network link",
        "No action if isolated; investigate if part of a flap cycle",
    ),
];

pub fn builtin_signatures() -> Result<Vec<Signature>, AppError> {
    let mut out = Vec::with_capacity(BUILTIN_SIGNATURES.len());
    for (pattern, component, severity, title, root_cause, fix) in BUILTIN_SIGNATURES {
        out.push(Signature {
            pattern: compile(pattern)?,
            component: component.to_string(),
            severity: IssueSeverity::from_token(severity),
            title: title.to_string(),
            root_cause: root_cause.to_string(),
            fix: fix.to_string(),
            kb_url: String::new(),
        });
    }
    Ok(out)
}

fn tsv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes())
}

/// Parse the tab-separated signature table. Malformed rows are skipped with a
/// warning; the table is ordered exactly as authored.
pub fn parse_signature_table(
    text: &str,
    warnings: &mut Vec<CollectionWarning>,
) -> Vec<Signature> {
    let mut out = Vec::new();
    for (idx, result) in tsv_reader(text).records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warnings.push(
                    CollectionWarning::new("SIGNATURE_ROW_PARSE_FAILED", "Skipped signature row")
                        .with_details(format!("row={idx}; err={e}")),
                );
                continue;
            }
        };
        if row.len() < 6 {
            warnings.push(
                CollectionWarning::new("SIGNATURE_ROW_TOO_SHORT", "Skipped short signature row")
                    .with_details(format!("row={idx}; fields={}", row.len())),
            );
            continue;
        }
        let pattern = match compile(&row[0]) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(
                    CollectionWarning::new(
                        "SIGNATURE_BAD_PATTERN",
                        "Skipped signature with invalid pattern",
                    )
                    .with_details(format!("row={idx}; err={e}")),
                );
                continue;
            }
        };
        out.push(Signature {
            pattern,
            component: row[1].to_string(),
            severity: IssueSeverity::from_token(&row[2]),
            title: row[3].to_string(),
            root_cause: row[4].to_string(),
            fix: row[5].to_string(),
            kb_url: row.get(6).unwrap_or("").to_string(),
        });
    }
    out
}

fn parse_onsite_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1"
    )
}

/// Parse the error-code registry. The first non-comment row is a header and
/// columns are resolved by name, so reordered exports still load.
pub fn parse_error_registry(
    text: &str,
    warnings: &mut Vec<CollectionWarning>,
) -> Vec<RegistryEntry> {
    let mut out = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for (idx, result) in tsv_reader(text).records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warnings.push(
                    CollectionWarning::new("REGISTRY_ROW_PARSE_FAILED", "Skipped registry row")
                        .with_details(format!("row={idx}; err={e}")),
                );
                continue;
            }
        };

        let Some(ref cols) = header else {
            header = Some(row.iter().map(|h| h.trim().to_string()).collect());
            continue;
        };

        let col = |names: &[&str]| -> String {
            for name in names {
                if let Some(pos) = cols.iter().position(|c| c.eq_ignore_ascii_case(name)) {
                    if let Some(v) = row.get(pos) {
                        return v.trim().to_string();
                    }
                }
            }
            String::new()
        };

        let name = col(&["name"]);
        let code = col(&["code"]);
        if name.is_empty() && code.is_empty() {
            warnings.push(
                CollectionWarning::new(
                    "REGISTRY_ROW_INCOMPLETE",
                    "Skipped registry row without name or code",
                )
                .with_details(format!("row={idx}")),
            );
            continue;
        }

        out.push(RegistryEntry {
            module: col(&["module"]),
            code,
            error_type: col(&["errorType", "type"]),
            name,
            description: col(&["description"]),
            troubleshooting: col(&["troubleshootingSteps", "troubleshooting"]),
            onsite_required: parse_onsite_flag(&col(&["onSiteServiceRequired", "onsite_flag"])),
            severity: IssueSeverity::from_token(&col(&["severity"])),
        });
    }
    out
}

impl SignatureDb {
    /// Built-ins only; external tables are optional inputs.
    pub fn builtin() -> Result<Self, AppError> {
        Ok(Self {
            signatures: builtin_signatures()?,
            registry: Vec::new(),
        })
    }

    /// Built-ins plus optional external signature table and error registry.
    /// External signatures are appended after built-ins, preserving the
    /// precedence of the curated rows. A missing file is a warning, not an
    /// error.
    pub fn load(
        signature_path: Option<&Path>,
        registry_path: Option<&Path>,
        warnings: &mut Vec<CollectionWarning>,
    ) -> Result<Self, AppError> {
        let mut db = Self::builtin()?;

        if let Some(path) = signature_path {
            match fs::read_to_string(path) {
                Ok(text) => db.signatures.extend(parse_signature_table(&text, warnings)),
                Err(e) => warnings.push(
                    CollectionWarning::new(
                        "SIGNATURE_TABLE_UNREADABLE",
                        "Signature table unavailable; using built-ins only",
                    )
                    .with_details(format!("path={}; err={e}", path.display())),
                ),
            }
        }

        if let Some(path) = registry_path {
            match fs::read_to_string(path) {
                Ok(text) => db.registry = parse_error_registry(&text, warnings),
                Err(e) => warnings.push(
                    CollectionWarning::new(
                        "REGISTRY_UNREADABLE",
                        "Error registry unavailable; registry scan disabled",
                    )
                    .with_details(format!("path={}; err={e}", path.display())),
                ),
            }
        }

        Ok(db)
    }

    /// First signature whose pattern matches `text`, in table order.
    pub fn match_line(&self, text: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.pattern.is_match(text))
    }

    /// First registry entry whose name or code appears in `text`.
    pub fn match_registry(&self, text: &str) -> Option<&RegistryEntry> {
        self.registry.iter().find(|e| {
            (!e.name.is_empty() && text.contains(&e.name))
                || (!e.code.is_empty() && text.contains(&e.code))
        })
    }

    /// Additive enrichment: append a troubleshooting clause and set the
    /// on-site flag on issues whose title or evidence matches a signature or
    /// registry entry. A miss leaves the issue exactly as its detector
    /// authored it.
    pub fn enrich_issues(&self, issues: &mut [Issue]) -> usize {
        let mut enriched = 0usize;
        for issue in issues.iter_mut() {
            let candidates: Vec<&str> = std::iter::once(issue.title.as_str())
                .chain(issue.evidence.iter().map(String::as_str))
                .collect();

            let mut matched = false;
            for text in &candidates {
                if let Some(sig) = self.match_line(text) {
                    let mut clause = format!(
                        " Root cause: {}. Troubleshooting: {}.",
                        sig.root_cause, sig.fix
                    );
                    if !sig.kb_url.is_empty() {
                        clause.push_str(&format!(" See: {}.", sig.kb_url));
                    }
                    issue.description.push_str(&clause);
                    matched = true;
                    break;
                }
                if let Some(entry) = self.match_registry(text) {
                    if !entry.troubleshooting.is_empty() {
                        issue
                            .description
                            .push_str(&format!(" Troubleshooting: {}.", entry.troubleshooting));
                    }
                    if entry.onsite_required {
                        issue.onsite_required = true;
                        issue.description.push_str(" On-site service required.");
                    }
                    matched = true;
                    break;
                }
            }
            if matched {
                enriched += 1;
            }
        }
        enriched
    }
}
