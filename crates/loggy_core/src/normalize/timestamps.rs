use time::format_description::well_known::Rfc3339;
use time::{format_description, Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::domain::CollectionWarning;

pub fn canonicalize_rfc3339_utc(dt: OffsetDateTime) -> Option<String> {
    let utc = dt.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339).ok()
}

fn parse_primitive_assume_utc(raw: &str, fmt: &str) -> Option<OffsetDateTime> {
    let items = format_description::parse(fmt).ok()?;
    let pdt = PrimitiveDateTime::parse(raw, &items).ok()?;
    Some(pdt.assume_utc())
}

/// Normalize a timestamp token from an application or generic ISO log line
/// into canonical RFC3339 UTC.
///
/// Contract:
/// - Deterministic allowlist only; no fuzzy parsing.
/// - Formats without a timezone are assumed UTC with an explicit warning.
/// - Unparseable input yields `None` with an explicit warning; the caller
///   keeps the record (null timestamp), it is never dropped.
pub fn normalize_timestamp(
    field: &str,
    raw_input: &str,
    warnings: &mut Vec<CollectionWarning>,
) -> Option<String> {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return canonicalize_rfc3339_utc(dt);
    }

    // ISO-like without timezone (assume UTC). Comma decimal separators appear
    // in some vendor logs; normalize to a dot before matching.
    let dotted = trimmed.replace(',', ".");
    for fmt in [
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]/[month]/[day] [hour]:[minute]:[second]",
    ] {
        if let Some(dt) = parse_primitive_assume_utc(&dotted, fmt) {
            warnings.push(
                CollectionWarning::new(
                    "NORMALIZE_TS_TZ_ASSUMED_UTC",
                    format!("Assumed UTC timezone for {field}"),
                )
                .with_details(format!("value={trimmed}; fmt={fmt}")),
            );
            return canonicalize_rfc3339_utc(dt);
        }
    }

    warnings.push(
        CollectionWarning::new(
            "NORMALIZE_TS_UNPARSEABLE",
            format!("Unparseable timestamp for {field}; record kept with null timestamp"),
        )
        .with_details(format!("raw={trimmed}")),
    );
    None
}

fn month_from_abbrev(s: &str) -> Option<Month> {
    match s {
        "Jan" => Some(Month::January),
        "Feb" => Some(Month::February),
        "Mar" => Some(Month::March),
        "Apr" => Some(Month::April),
        "May" => Some(Month::May),
        "Jun" => Some(Month::June),
        "Jul" => Some(Month::July),
        "Aug" => Some(Month::August),
        "Sep" => Some(Month::September),
        "Oct" => Some(Month::October),
        "Nov" => Some(Month::November),
        "Dec" => Some(Month::December),
        _ => None,
    }
}

/// Parse the year-less syslog prefix `Mon DD HH:MM:SS`.
///
/// Syslog omits the year, so the caller supplies one (derived from sibling
/// ISO-stamped files in the same bundle, or a documented fallback). The
/// assumption is surfaced once per file by the normalizer, not here.
pub fn parse_syslog_timestamp(raw: &str, assumed_year: i32) -> Option<String> {
    let mut parts = raw.split_whitespace();
    let month = month_from_abbrev(parts.next()?)?;
    let day: u8 = parts.next()?.parse().ok()?;
    let hms = parts.next()?;
    let mut it = hms.split(':');
    let hour: u8 = it.next()?.parse().ok()?;
    let minute: u8 = it.next()?.parse().ok()?;
    let second: u8 = it.next()?.parse().ok()?;

    let date = Date::from_calendar_date(assumed_year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    canonicalize_rfc3339_utc(PrimitiveDateTime::new(date, time).assume_utc())
}

/// Parse the HTTP access-log clock `DD/Mon/YYYY:HH:MM:SS +ZZZZ`.
pub fn parse_http_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim_matches(|c| c == '[' || c == ']');
    let (datetime, offset) = match raw.split_once(' ') {
        Some((d, o)) => (d, Some(o)),
        None => (raw, None),
    };

    let mut it = datetime.split(':');
    let date_part = it.next()?;
    let hour: u8 = it.next()?.parse().ok()?;
    let minute: u8 = it.next()?.parse().ok()?;
    let second: u8 = it.next()?.parse().ok()?;

    let mut dp = date_part.split('/');
    let day: u8 = dp.next()?.parse().ok()?;
    let month = month_from_abbrev(dp.next()?)?;
    let year: i32 = dp.next()?.parse().ok()?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    let pdt = PrimitiveDateTime::new(date, time);

    let dt = match offset {
        Some(o) if o.len() == 5 => {
            let sign: i32 = if o.starts_with('-') { -1 } else { 1 };
            let hours: i32 = o.get(1..3)?.parse().ok()?;
            let minutes: i32 = o.get(3..5)?.parse().ok()?;
            let off = UtcOffset::from_whole_seconds(sign * (hours * 3600 + minutes * 60)).ok()?;
            pdt.assume_offset(off)
        }
        _ => pdt.assume_utc(),
    };
    canonicalize_rfc3339_utc(dt)
}

/// Extract a canonical timestamp from either the pipe-delimited normalized
/// line shape (`TS|S|component|message`) or a legacy raw line starting with an
/// ISO timestamp. Collaborators persist parsed output in the delimited form,
/// so both shapes must work transparently.
pub fn extract_line_timestamp(line: &str) -> Option<String> {
    let candidate = match line.split_once('|') {
        Some((ts, _)) => ts.trim(),
        None => line.split_whitespace().next()?,
    };
    if let Ok(dt) = OffsetDateTime::parse(candidate, &Rfc3339) {
        return canonicalize_rfc3339_utc(dt);
    }
    let mut scratch = Vec::new();
    // Legacy raw lines may carry `DATE TIME` as two tokens.
    if let Some((date, rest)) = line.trim().split_once(' ') {
        let time_tok = rest.split_whitespace().next().unwrap_or("");
        let joined = format!("{date} {time_tok}");
        if let Some(canon) = normalize_timestamp("line", &joined, &mut scratch) {
            return Some(canon);
        }
    }
    normalize_timestamp("line", candidate, &mut scratch)
}
