//! TCX extraction.

use crate::record::{RawRecord, Value};
use crate::xml::{parse_document, XmlElement};
use crate::TrackError;

pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("latitudedegrees", "latitude"),
    ("longitudedegrees", "longitude"),
    ("altitudemeters", "altitude"),
    ("watts", "power"),
    ("heartratebpm", "heart_rate"),
    ("distancemeters", "distance"),
    ("time", "timestamp"),
];

/// Bookkeeping and unit-duplicate fields some TCX tooling adds per trackpoint.
pub const DROPPED_FIELDS: &[&str] = &[
    "type",
    "altitudefeet",
    "seq",
    "distancemiles",
    "distancekilometers",
    "cadencex2",
    "elapsedtime",
];

/// Decode every `<Trackpoint>` into a lowercase field-name to text mapping.
///
/// Leaves are named after their own tag, except `<Value>` wrappers which take
/// their parent's name (`<HeartRateBpm><Value>` is `heartratebpm`).
pub fn decode(input: &[u8]) -> Result<Vec<RawRecord>, TrackError> {
    let root = parse_document(input).map_err(TrackError::TcxParse)?;
    if root.local_name != "TrainingCenterDatabase" {
        return Err(TrackError::TcxParse(format!(
            "unexpected root element <{}>",
            root.local_name
        )));
    }
    let mut trackpoints = Vec::new();
    root.descendants_named("Trackpoint", &mut trackpoints);

    Ok(trackpoints
        .into_iter()
        .map(|trackpoint| {
            let mut record = RawRecord::new();
            for child in &trackpoint.children {
                collect_leaves(child, &trackpoint.local_name, &mut record);
            }
            record
        })
        .collect())
}

fn collect_leaves(element: &XmlElement, parent: &str, record: &mut RawRecord) {
    if element.is_leaf() {
        if element.text.is_empty() {
            return;
        }
        let name = if element.local_name == "Value" {
            parent
        } else {
            element.local_name.as_str()
        };
        record.insert(name.to_ascii_lowercase(), Value::Text(element.text.clone()));
        return;
    }
    for child in &element.children {
        collect_leaves(child, &element.local_name, record);
    }
}

pub fn read_records(input: &[u8]) -> Result<Vec<RawRecord>, TrackError> {
    Ok(extract(decode(input)?))
}

/// TCX needs no unit fixes; names are reconciled by the alias table.
pub fn extract(trackpoints: Vec<RawRecord>) -> Vec<RawRecord> {
    trackpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_records;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase
    xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
    xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2020-03-14T09:00:00.000Z</Id>
      <Lap StartTime="2020-03-14T09:00:00.000Z">
        <TotalTimeSeconds>3.0</TotalTimeSeconds>
        <Track>
          <Trackpoint>
            <Time>2020-03-14T09:00:00.000Z</Time>
            <Position>
              <LatitudeDegrees>51.5</LatitudeDegrees>
              <LongitudeDegrees>-0.125</LongitudeDegrees>
            </Position>
            <AltitudeMeters>12.5</AltitudeMeters>
            <DistanceMeters>0.0</DistanceMeters>
            <HeartRateBpm>
              <Value>97</Value>
            </HeartRateBpm>
            <Cadence>70</Cadence>
            <Extensions>
              <ns3:TPX>
                <ns3:Speed>4.1</ns3:Speed>
                <ns3:Watts>180</ns3:Watts>
              </ns3:TPX>
            </Extensions>
          </Trackpoint>
          <Trackpoint>
            <Time>2020-03-14T09:00:03.000Z</Time>
            <AltitudeMeters>13.0</AltitudeMeters>
            <DistanceMeters>12.4</DistanceMeters>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    #[test]
    fn decodes_trackpoint_leaves() {
        let records = decode(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.get("time"), Some(&Value::Text("2020-03-14T09:00:00.000Z".into())));
        assert_eq!(first.get("latitudedegrees"), Some(&Value::Text("51.5".into())));
        assert_eq!(first.get("heartratebpm"), Some(&Value::Text("97".into())));
        assert_eq!(first.get("watts"), Some(&Value::Text("180".into())));
        assert_eq!(first.get("speed"), Some(&Value::Text("4.1".into())));
        assert!(!first.contains_key("value"));
        assert!(!records[1].contains_key("latitudedegrees"));
    }

    #[test]
    fn maps_into_canonical_fields() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        let canonical = normalize_records(records, FIELD_ALIASES, DROPPED_FIELDS).unwrap();
        let first = &canonical[0];
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2020, 3, 14, 9, 0, 0).unwrap());
        assert_eq!(first.latitude, Some(51.5));
        assert_eq!(first.longitude, Some(-0.125));
        assert_eq!(first.altitude, Some(12.5));
        assert_eq!(first.distance, Some(0.0));
        assert_eq!(first.heart_rate, Some(97.0));
        assert_eq!(first.cadence, Some(70.0));
        assert_eq!(first.power, Some(180.0));
        assert_eq!(first.extra.keys().collect::<Vec<_>>(), vec!["speed"]);

        let second = &canonical[1];
        assert_eq!(second.latitude, None);
        assert_eq!(second.power, None);
    }

    #[test]
    fn bookkeeping_fields_are_dropped() {
        let mut record = RawRecord::new();
        record.insert("time".into(), Value::Text("2020-03-14T09:00:00Z".into()));
        for name in DROPPED_FIELDS {
            record.insert(name.to_string(), Value::Text("1".into()));
        }
        let canonical = normalize_records(vec![record], FIELD_ALIASES, DROPPED_FIELDS).unwrap();
        assert!(canonical[0].extra.is_empty());
    }

    #[test]
    fn foreign_root_is_rejected() {
        let err = decode(b"<gpx version=\"1.1\"></gpx>").unwrap_err();
        assert!(matches!(err, TrackError::TcxParse(_)));
    }
}
