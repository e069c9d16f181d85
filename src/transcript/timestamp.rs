use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone};
use serde_json::Value;

/// Wall-clock layout used by the TXT and Markdown formats.
pub const EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TIME_ONLY_FORMAT: &str = "%H:%M:%S";

pub fn format_export(ts: &DateTime<Local>) -> String {
    ts.format(EXPORT_FORMAT).to_string()
}

pub fn format_json(ts: &DateTime<Local>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Resolve a wall-clock time in the local zone. Ambiguous times take the
/// earlier instant; times skipped by a DST jump do not resolve.
pub fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}

pub fn parse_full(text: &str) -> Option<DateTime<Local>> {
    NaiveDateTime::parse_from_str(text.trim(), EXPORT_FORMAT)
        .ok()
        .and_then(resolve_local)
}

pub fn parse_time_on(text: &str, date: NaiveDate) -> Option<DateTime<Local>> {
    NaiveTime::parse_from_str(text.trim(), TIME_ONLY_FORMAT)
        .ok()
        .and_then(|time| resolve_local(date.and_time(time)))
}

/// Accepts RFC 3339, ISO-8601 without offset (local), `YYYY-MM-DD HH:MM:SS`,
/// or a numeric epoch value in seconds.
pub fn parse_json_value(value: &Value) -> Option<DateTime<Local>> {
    match value {
        Value::String(text) => parse_iso(text),
        Value::Number(number) => {
            let secs = number.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos).map(|utc| utc.with_timezone(&Local))
        }
        _ => None,
    }
}

fn parse_iso(text: &str) -> Option<DateTime<Local>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Local));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .and_then(resolve_local)
}
