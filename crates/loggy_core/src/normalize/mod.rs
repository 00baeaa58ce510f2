pub mod timestamps;

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::domain::{CollectionWarning, LogRecord, Severity};
use crate::error::AppError;
use timestamps::{normalize_timestamp, parse_http_timestamp, parse_syslog_timestamp};

/// Recognized source shapes. Identification is by content sniffing on the
/// first lines, never by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Component-tagged application format: `TIMESTAMP [SEV] message`.
    Tagged,
    /// Syslog: `Mon DD HH:MM:SS host proc[pid]: message`.
    Syslog,
    /// Kernel ring buffer: `[seconds.micros] message`.
    Kernel,
    /// Generic ISO-8601-prefixed lines.
    Iso,
    /// HTTP access log lines.
    HttpAccess,
}

/// How many leading lines the sniffer inspects.
const SNIFF_LINES: usize = 20;

pub struct Normalizer {
    re_ansi: Regex,
    re_tagged: Regex,
    re_syslog: Regex,
    re_kernel: Regex,
    re_iso: Regex,
    re_http: Regex,
}

fn re(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|e| {
        AppError::new("NORMALIZE_BAD_PATTERN", "Invalid normalizer pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })
}

/// Keyword severity classification for formats without an explicit level
/// token (syslog, kernel). Message content wins over position.
fn classify_severity(message: &str) -> Severity {
    let lower = message.to_ascii_lowercase();
    if lower.contains("critical") || lower.contains("panic") || lower.contains("emerg") {
        Severity::Critical
    } else if lower.contains("error") || lower.contains("fail") || lower.contains("fault") {
        Severity::Error
    } else if lower.contains("warn") {
        Severity::Warn
    } else {
        Severity::Info
    }
}

impl Normalizer {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_ansi: re(r"\x1b\[[0-9;]*[a-zA-Z]")?,
            re_tagged: re(
                r"^(?P<ts>\d{4}[-/]\d{2}[-/]\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?)\s+\[(?P<sev>[A-Za-z]+)\]\s*(?P<msg>.*)$",
            )?,
            re_syslog: re(
                r"^(?P<ts>[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(?P<host>\S+)\s+(?P<proc>[A-Za-z0-9_.\-/]+)(?:\[(?P<pid>\d+)\])?:\s*(?P<msg>.*)$",
            )?,
            re_kernel: re(r"^\[\s*(?P<secs>\d+\.\d+)\]\s*(?P<msg>.*)$")?,
            re_iso: re(
                r"^(?P<ts>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\s+(?P<msg>.*)$",
            )?,
            re_http: re(
                r#"^(?P<host>\S+)\s+\S+\s+\S+\s+\[(?P<ts>[^\]]+)\]\s+"(?P<req>[^"]*)"\s+(?P<status>\d{3})\s+(?P<bytes>\S+)"#,
            )?,
        })
    }

    pub fn strip_ansi(&self, line: &str) -> String {
        let no_escape = self.re_ansi.replace_all(line, "");
        no_escape
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect()
    }

    /// Identify the source shape from the first lines of a file.
    ///
    /// The first format that matches any sniffed line wins, in specificity
    /// order (tagged before generic ISO, since tagged lines also carry an ISO
    /// prefix).
    pub fn sniff_format(&self, lines: &[String]) -> Option<LogFormat> {
        let sample: Vec<String> = lines
            .iter()
            .take(SNIFF_LINES)
            .map(|l| self.strip_ansi(l))
            .collect();
        for line in &sample {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if self.re_tagged.is_match(line) {
                return Some(LogFormat::Tagged);
            }
            if self.re_http.is_match(line) {
                return Some(LogFormat::HttpAccess);
            }
            if self.re_syslog.is_match(line) {
                return Some(LogFormat::Syslog);
            }
            if self.re_kernel.is_match(line) {
                return Some(LogFormat::Kernel);
            }
            if self.re_iso.is_match(line) {
                return Some(LogFormat::Iso);
            }
        }
        None
    }

    /// Normalize one already-sniffed line. Returns `None` only for lines that
    /// carry no content at all; a recognized line with a broken timestamp
    /// still yields a record with a null timestamp.
    pub fn normalize_line(
        &self,
        raw: &str,
        format: LogFormat,
        component: &str,
        source_file: &str,
        source_line: usize,
        assumed_year: i32,
        warnings: &mut Vec<CollectionWarning>,
    ) -> Option<LogRecord> {
        let line = self.strip_ansi(raw);
        let line = line.trim_end();
        if line.trim().is_empty() {
            return None;
        }

        let (timestamp, severity, comp, message) = match format {
            LogFormat::Tagged => match self.re_tagged.captures(line) {
                Some(c) => (
                    normalize_timestamp("line", &c["ts"], warnings),
                    Severity::from_token(&c["sev"]),
                    component.to_string(),
                    c["msg"].to_string(),
                ),
                None => (
                    None,
                    classify_severity(line),
                    component.to_string(),
                    line.to_string(),
                ),
            },
            LogFormat::Syslog => match self.re_syslog.captures(line) {
                Some(c) => (
                    parse_syslog_timestamp(&c["ts"], assumed_year),
                    classify_severity(&c["msg"]),
                    c["proc"].to_string(),
                    c["msg"].to_string(),
                ),
                None => (
                    None,
                    classify_severity(line),
                    component.to_string(),
                    line.to_string(),
                ),
            },
            LogFormat::Kernel => {
                // Boot-relative offsets are not wall-clock time; the bracket
                // prefix stays in the message so boot timing can read it.
                (
                    None,
                    classify_severity(line),
                    component.to_string(),
                    line.to_string(),
                )
            }
            LogFormat::Iso => match self.re_iso.captures(line) {
                Some(c) => (
                    normalize_timestamp("line", &c["ts"], warnings),
                    classify_severity(&c["msg"]),
                    component.to_string(),
                    c["msg"].to_string(),
                ),
                None => (
                    None,
                    classify_severity(line),
                    component.to_string(),
                    line.to_string(),
                ),
            },
            LogFormat::HttpAccess => match self.re_http.captures(line) {
                Some(c) => {
                    let status: u16 = c["status"].parse().unwrap_or(0);
                    let severity = if status >= 500 {
                        Severity::Error
                    } else if status >= 400 {
                        Severity::Warn
                    } else {
                        Severity::Info
                    };
                    (
                        parse_http_timestamp(&c["ts"]),
                        severity,
                        component.to_string(),
                        format!("{} {} {}", &c["req"], status, &c["bytes"]),
                    )
                }
                None => (
                    None,
                    classify_severity(line),
                    component.to_string(),
                    line.to_string(),
                ),
            },
        };

        Some(LogRecord {
            timestamp,
            severity,
            component: comp,
            message,
            source_file: source_file.to_string(),
            source_line,
        })
    }

    /// Parse a whole file into normalized records.
    ///
    /// Failure contract: an unreadable or unrecognized file yields zero
    /// records and a collection-level warning, never an error — absence of
    /// one file must not abort the run.
    pub fn normalize_file(
        &self,
        path: &Path,
        declared_component: &str,
        assumed_year: i32,
        warnings: &mut Vec<CollectionWarning>,
    ) -> Vec<LogRecord> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warnings.push(
                    CollectionWarning::new("COLLECT_FILE_UNREADABLE", "Skipped unreadable file")
                        .with_details(format!("path={}; err={e}", path.display())),
                );
                return Vec::new();
            }
        };

        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let Some(format) = self.sniff_format(&lines) else {
            warnings.push(
                CollectionWarning::new(
                    "COLLECT_FILE_UNRECOGNIZED",
                    "Skipped file with no recognized log format",
                )
                .with_details(format!("path={}", path.display())),
            );
            return Vec::new();
        };

        let source_file = path.display().to_string();
        let mut out = Vec::with_capacity(lines.len());
        for (idx, raw) in lines.iter().enumerate() {
            if let Some(rec) = self.normalize_line(
                raw,
                format,
                declared_component,
                &source_file,
                idx + 1,
                assumed_year,
                warnings,
            ) {
                out.push(rec);
            }
        }
        out
    }
}

/// Derive the component identity a file declares: the file stem with rotation
/// suffixes stripped (`mqtt_client.log.1` -> `mqtt_client`).
pub fn component_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut stem = name.as_str();
    loop {
        let Some((head, tail)) = stem.rsplit_once('.') else {
            break;
        };
        if tail == "log" || tail == "txt" || tail == "parsed" || tail.parse::<u32>().is_ok() {
            stem = head;
        } else {
            break;
        }
    }
    stem.to_string()
}
