//! Canonical data model shared by every format.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A decoded field value as handed over by a format decoder.
///
/// Deserialization tries variants in order, so RFC 3339 text reads back as a
/// `Timestamp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Value {
    /// Numeric view of the value; text is parsed, timestamps are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

/// Field name to value mapping, in the vocabulary of the source format.
pub type RawRecord = BTreeMap<String, Value>;

/// The numeric columns of the canonical schema, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Latitude,
    Longitude,
    Altitude,
    HeartRate,
    Cadence,
    Power,
    Temperature,
    Distance,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Latitude,
        CanonicalField::Longitude,
        CanonicalField::Altitude,
        CanonicalField::HeartRate,
        CanonicalField::Cadence,
        CanonicalField::Power,
        CanonicalField::Temperature,
        CanonicalField::Distance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Latitude => "latitude",
            CanonicalField::Longitude => "longitude",
            CanonicalField::Altitude => "altitude",
            CanonicalField::HeartRate => "heart_rate",
            CanonicalField::Cadence => "cadence",
            CanonicalField::Power => "power",
            CanonicalField::Temperature => "temperature",
            CanonicalField::Distance => "distance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Inclusive range of legal values, for fields that have one.
    pub fn valid_range(self) -> Option<(f64, f64)> {
        match self {
            CanonicalField::Latitude => Some((-90.0, 90.0)),
            CanonicalField::Longitude => Some((-180.0, 180.0)),
            _ => None,
        }
    }
}

/// One observation in the canonical schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub heart_rate: Option<f64>,
    pub cadence: Option<f64>,
    pub power: Option<f64>,
    pub temperature: Option<f64>,
    pub distance: Option<f64>,
    /// Fields outside the canonical schema, kept verbatim.
    pub extra: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude: None,
            longitude: None,
            altitude: None,
            heart_rate: None,
            cadence: None,
            power: None,
            temperature: None,
            distance: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::Latitude => self.latitude,
            CanonicalField::Longitude => self.longitude,
            CanonicalField::Altitude => self.altitude,
            CanonicalField::HeartRate => self.heart_rate,
            CanonicalField::Cadence => self.cadence,
            CanonicalField::Power => self.power,
            CanonicalField::Temperature => self.temperature,
            CanonicalField::Distance => self.distance,
        }
    }

    pub fn set(&mut self, field: CanonicalField, value: Option<f64>) {
        let slot = match field {
            CanonicalField::Latitude => &mut self.latitude,
            CanonicalField::Longitude => &mut self.longitude,
            CanonicalField::Altitude => &mut self.altitude,
            CanonicalField::HeartRate => &mut self.heart_rate,
            CanonicalField::Cadence => &mut self.cadence,
            CanonicalField::Power => &mut self.power,
            CanonicalField::Temperature => &mut self.temperature,
            CanonicalField::Distance => &mut self.distance,
        };
        *slot = value;
    }

    /// Copy every field missing here from `other`. The timestamp is untouched.
    pub fn fill_from(&mut self, other: &CanonicalRecord) {
        for field in CanonicalField::ALL {
            if self.get(field).is_none() {
                self.set(field, other.get(field));
            }
        }
        for (name, value) in &other.extra {
            self.extra
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Cell text for a column name, canonical or passthrough.
    pub fn cell(&self, column: &str) -> Option<String> {
        match CanonicalField::from_name(column) {
            Some(field) => self.get(field).map(|v| v.to_string()),
            None => self.extra.get(column).map(|v| v.to_string()),
        }
    }
}

/// Uniform per-second series produced by the resampler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    records: Vec<CanonicalRecord>,
}

impl TimeSeries {
    pub(crate) fn from_records(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Data columns present anywhere in the series: canonical fields in
    /// schema order, then passthrough fields by name.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = CanonicalField::ALL
            .into_iter()
            .filter(|&field| self.records.iter().any(|r| r.get(field).is_some()))
            .map(|field| field.name().to_string())
            .collect();
        let mut extra: Vec<&String> = self.records.iter().flat_map(|r| r.extra.keys()).collect();
        extra.sort();
        extra.dedup();
        columns.extend(extra.into_iter().cloned());
        columns
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn values_keep_their_variant_through_serde() {
        for value in [
            Value::Integer(-3),
            Value::Float(2.5),
            Value::Timestamp(Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap()),
            Value::Text("gravel".into()),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "{json}");
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn field_names_round_trip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(field.name()), Some(field));
        }
        assert_eq!(CanonicalField::from_name("hr"), None);
    }

    #[test]
    fn fill_from_keeps_existing_values() {
        let mut target = CanonicalRecord::new(at(1));
        target.power = Some(200.0);
        let mut source = CanonicalRecord::new(at(0));
        source.power = Some(150.0);
        source.heart_rate = Some(140.0);
        source
            .extra
            .insert("speed".into(), Value::Text("3.2".into()));

        target.fill_from(&source);

        assert_eq!(target.timestamp, at(1));
        assert_eq!(target.power, Some(200.0));
        assert_eq!(target.heart_rate, Some(140.0));
        assert_eq!(target.extra.get("speed"), Some(&Value::Text("3.2".into())));
    }

    #[test]
    fn columns_follow_schema_then_passthrough() {
        let mut a = CanonicalRecord::new(at(0));
        a.altitude = Some(1.0);
        a.extra.insert("speed".into(), Value::Float(1.0));
        let mut b = CanonicalRecord::new(at(1));
        b.latitude = Some(45.0);
        b.extra.insert("course".into(), Value::Integer(90));
        let series = TimeSeries::from_records(vec![a, b]);
        assert_eq!(
            series.columns(),
            vec!["latitude", "altitude", "course", "speed"]
        );
    }

    #[test]
    fn value_numeric_view() {
        assert_eq!(Value::Text(" 142 ".into()).as_f64(), Some(142.0));
        assert_eq!(Value::Integer(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::Text("n/a".into()).as_f64(), None);
        assert_eq!(Value::Timestamp(at(0)).as_f64(), None);
    }

    #[test]
    fn timestamps_render_as_whole_seconds() {
        assert_eq!(format_timestamp(&at(0)), "2020-09-13T12:26:40Z");
    }
}
