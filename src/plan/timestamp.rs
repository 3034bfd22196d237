use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Normalize the timestamp shapes the backend emits into one canonical type.
/// Document reads return `{seconds}` or `{_seconds}` objects, ISO-8601
/// strings, or bare epoch numbers; this is the only place that sniffing
/// happens.
pub fn normalize_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            Utc.timestamp_opt(seconds, 0).single()
        }
        Value::String(s) => parse_iso(s),
        Value::Number(n) => {
            let seconds = n.as_i64()?;
            Utc.timestamp_opt(seconds, 0).single()
        }
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Date-only strings ("2024-03-10") appear in attempt records
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Serde adapter for fields carrying any of the tolerated shapes.
/// Unrecognized shapes deserialize as None rather than failing the document.
pub fn deserialize_flexible<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(normalize_timestamp))
}
