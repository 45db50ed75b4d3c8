//! Renames format vocabulary into the canonical schema and parses timestamps.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::record::{CanonicalField, CanonicalRecord, RawRecord, Value};
use crate::TrackError;

pub const TIMESTAMP_FIELD: &str = "timestamp";

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Turn extractor output into canonical records.
///
/// Fields listed in `dropped` are discarded, the rest renamed through
/// `aliases` (source name, canonical name). Records without a timestamp are
/// skipped. Same-second duplicates are left for the resampler.
pub fn normalize_records(
    records: Vec<RawRecord>,
    aliases: &[(&str, &str)],
    dropped: &[&str],
) -> Result<Vec<CanonicalRecord>, TrackError> {
    let mut out = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for raw in records {
        match normalize_record(raw, aliases, dropped)? {
            Some(record) => out.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("skipped {} records without a timestamp", skipped);
    }
    Ok(out)
}

fn normalize_record(
    raw: RawRecord,
    aliases: &[(&str, &str)],
    dropped: &[&str],
) -> Result<Option<CanonicalRecord>, TrackError> {
    let mut renamed = RawRecord::new();
    for (name, value) in raw {
        if dropped.contains(&name.as_str()) {
            continue;
        }
        let name = aliases
            .iter()
            .find(|(source, _)| *source == name)
            .map(|(_, target)| (*target).to_string())
            .unwrap_or(name);
        renamed.insert(name, value);
    }

    let timestamp = match renamed.remove(TIMESTAMP_FIELD) {
        Some(value) => parse_timestamp(&value)?,
        None => return Ok(None),
    };

    let mut record = CanonicalRecord::new(timestamp);
    for (name, value) in renamed {
        match CanonicalField::from_name(&name) {
            Some(field) => record.set(field, Some(canonical_value(field, &value)?)),
            None => {
                record.extra.insert(name, value);
            }
        }
    }
    Ok(Some(record))
}

fn canonical_value(field: CanonicalField, value: &Value) -> Result<f64, TrackError> {
    let number = value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TrackError::InvalidFieldValue {
            field: field.name().to_string(),
            value: value.to_string(),
        })?;
    if let Some((min, max)) = field.valid_range() {
        if !(min..=max).contains(&number) {
            return Err(TrackError::CoordinateOutOfRange {
                field: field.name().to_string(),
                value: number,
            });
        }
    }
    Ok(number)
}

/// Absolute time of a timestamp value. Naive text is taken as UTC.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, TrackError> {
    let text = match value {
        Value::Timestamp(ts) => return Ok(*ts),
        Value::Text(text) => text.trim(),
        other => return Err(TrackError::InvalidTimestamp(other.to_string())),
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TrackError::InvalidTimestamp(text.to_string()))
}
