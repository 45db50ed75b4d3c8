//! FIT extraction on top of `fitparser`.

use chrono::Utc;
use fitparser::profile::MesgNum;
use fitparser::Value as FitValue;

use crate::record::{RawRecord, Value};
use crate::TrackError;

/// Degrees per semicircle: the signed 32-bit range covers the full circle,
/// so 2^31 semicircles equal 180 degrees. Exact in `f64`.
pub const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Record altitude is stored as `(meters + 500) * 5` in an unsigned integer.
pub const ALTITUDE_SCALE: f64 = 5.0;
pub const ALTITUDE_OFFSET_M: f64 = 500.0;

/// FIT record field names already match the canonical vocabulary.
pub const FIELD_ALIASES: &[(&str, &str)] = &[];
pub const DROPPED_FIELDS: &[&str] = &["position_lat", "position_long"];

pub fn semicircles_to_degrees(semicircles: i64) -> f64 {
    semicircles as f64 * SEMICIRCLES_TO_DEGREES
}

pub fn altitude_from_raw(raw: f64) -> f64 {
    raw / ALTITUDE_SCALE - ALTITUDE_OFFSET_M
}

/// Decode a FIT file and extract one record per `record` message.
pub fn read_records(input: &[u8]) -> Result<Vec<RawRecord>, TrackError> {
    let messages =
        fitparser::de::from_bytes(input).map_err(|e| TrackError::FitParse(e.to_string()))?;
    let raw = messages
        .into_iter()
        .filter(|message| message.kind() == MesgNum::Record)
        .map(|message| {
            message
                .fields()
                .iter()
                .filter_map(|field| {
                    fit_value(field.value()).map(|value| (field.name().to_string(), value))
                })
                .collect::<RawRecord>()
        })
        .collect();
    Ok(extract(raw))
}

/// Apply FIT unit fixes: semicircles to degrees, fixed-point altitude to meters.
///
/// Integer altitude is the raw fixed-point encoding. A float altitude has
/// already been scaled by the decoder and is kept as is.
pub fn extract(records: Vec<RawRecord>) -> Vec<RawRecord> {
    records.into_iter().map(extract_record).collect()
}

fn extract_record(mut record: RawRecord) -> RawRecord {
    for (source, target) in [("position_lat", "latitude"), ("position_long", "longitude")] {
        if let Some(value) = record.remove(source) {
            let degrees = match value {
                Value::Integer(semicircles) => Value::Float(semicircles_to_degrees(semicircles)),
                Value::Float(semicircles) => Value::Float(semicircles * SEMICIRCLES_TO_DEGREES),
                other => other,
            };
            record.insert(target.to_string(), degrees);
        }
    }
    let raw_altitude = match record.get("altitude") {
        Some(Value::Integer(raw)) => Some(*raw),
        _ => None,
    };
    if let Some(raw) = raw_altitude {
        record.insert(
            "altitude".to_string(),
            Value::Float(altitude_from_raw(raw as f64)),
        );
    }
    record
}

fn fit_value(value: &FitValue) -> Option<Value> {
    match value {
        FitValue::Timestamp(ts) => Some(Value::Timestamp(ts.with_timezone(&Utc))),
        FitValue::Float32(v) => Some(Value::Float(*v as f64)),
        FitValue::Float64(v) => Some(Value::Float(*v)),
        FitValue::SInt8(v) => Some(Value::Integer(*v as i64)),
        FitValue::SInt16(v) => Some(Value::Integer(*v as i64)),
        FitValue::SInt32(v) => Some(Value::Integer(*v as i64)),
        FitValue::SInt64(v) => Some(Value::Integer(*v)),
        FitValue::UInt8(v) | FitValue::UInt8z(v) | FitValue::Byte(v) | FitValue::Enum(v) => {
            Some(Value::Integer(*v as i64))
        }
        FitValue::UInt16(v) | FitValue::UInt16z(v) => Some(Value::Integer(*v as i64)),
        FitValue::UInt32(v) | FitValue::UInt32z(v) => Some(Value::Integer(*v as i64)),
        FitValue::UInt64(v) | FitValue::UInt64z(v) => {
            i64::try_from(*v).ok().map(Value::Integer)
        }
        FitValue::String(s) => Some(Value::Text(s.clone())),
        FitValue::Array(values) => values.iter().find_map(fit_value),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
