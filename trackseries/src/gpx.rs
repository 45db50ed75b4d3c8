//! GPX extraction.
//!
//! The `gpx` crate supplies the track/segment/point tree but does not keep
//! `<extensions>`, so a second pass over the document collects each
//! `<trkpt>`'s extension elements. Both passes walk points in document order.

use std::io::Cursor;

use crate::record::{RawRecord, Value};
use crate::xml::{parse_document, XmlElement};
use crate::TrackError;

pub const GPX_1_0_NS: &str = "http://www.topografix.com/GPX/1/0";
pub const GPX_1_1_NS: &str = "http://www.topografix.com/GPX/1/1";
pub const TRACK_POINT_EXTENSION_V1_NS: &str =
    "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
pub const TRACK_POINT_EXTENSION_V2_NS: &str =
    "http://www.garmin.com/xmlschemas/TrackPointExtension/v2";

pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("hr", "heart_rate"),
    ("cad", "cadence"),
    ("atemp", "temperature"),
];
pub const DROPPED_FIELDS: &[&str] = &[];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExtensionRule {
    /// The element's text becomes this field.
    Field(&'static str),
    /// Each child becomes a field named after its local name.
    Expand,
}

/// (namespace, local name) of recognised extension elements.
const EXTENSION_RULES: &[(&str, &str, ExtensionRule)] = &[
    ("", "power", ExtensionRule::Field("power")),
    (GPX_1_0_NS, "power", ExtensionRule::Field("power")),
    (GPX_1_1_NS, "power", ExtensionRule::Field("power")),
    (TRACK_POINT_EXTENSION_V1_NS, "TrackPointExtension", ExtensionRule::Expand),
    (TRACK_POINT_EXTENSION_V2_NS, "TrackPointExtension", ExtensionRule::Expand),
];

fn extension_rule(element: &XmlElement) -> Option<ExtensionRule> {
    EXTENSION_RULES
        .iter()
        .find(|(ns, name, _)| *ns == element.namespace && *name == element.local_name)
        .map(|(_, _, rule)| *rule)
}

/// One decoded track point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpxPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    /// RFC 3339 text.
    pub time: Option<String>,
    pub extensions: Vec<XmlElement>,
}

/// Decode every track point of a GPX document, in document order.
pub fn decode(input: &[u8]) -> Result<Vec<GpxPoint>, TrackError> {
    let gpx = gpx::read(Cursor::new(input)).map_err(|e| TrackError::GpxParse(e.to_string()))?;

    let mut points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let time = match point.time {
                    Some(time) => Some(
                        time.format()
                            .map_err(|e| TrackError::GpxParse(e.to_string()))?,
                    ),
                    None => None,
                };
                let geo = point.point();
                points.push(GpxPoint {
                    latitude: geo.y(),
                    longitude: geo.x(),
                    elevation: point.elevation,
                    time,
                    extensions: Vec::new(),
                });
            }
        }
    }

    let root = parse_document(input).map_err(TrackError::GpxParse)?;
    let mut trkpts = Vec::new();
    for trk in root.children.iter().filter(|c| c.local_name == "trk") {
        trk.descendants_named("trkpt", &mut trkpts);
    }
    if trkpts.len() != points.len() {
        return Err(TrackError::GpxParse(format!(
            "found {} track points but {} <trkpt> elements",
            points.len(),
            trkpts.len()
        )));
    }
    for (point, trkpt) in points.iter_mut().zip(trkpts) {
        if let Some(extensions) = trkpt.child("extensions") {
            point.extensions = extensions.children.clone();
        }
    }
    Ok(points)
}

pub fn read_records(input: &[u8]) -> Result<Vec<RawRecord>, TrackError> {
    Ok(extract(decode(input)?))
}

/// One record per point: position, elevation as altitude, time, and the
/// fields carried by recognised extensions.
pub fn extract(points: Vec<GpxPoint>) -> Vec<RawRecord> {
    points.into_iter().map(extract_point).collect()
}

fn extract_point(point: GpxPoint) -> RawRecord {
    let mut record = RawRecord::new();
    record.insert("latitude".into(), Value::Float(point.latitude));
    record.insert("longitude".into(), Value::Float(point.longitude));
    if let Some(elevation) = point.elevation {
        record.insert("altitude".into(), Value::Float(elevation));
    }
    if let Some(time) = point.time {
        record.insert("timestamp".into(), Value::Text(time));
    }
    for extension in &point.extensions {
        match extension_rule(extension) {
            // An empty element carries no observation.
            Some(ExtensionRule::Field(name)) => {
                if !extension.text.is_empty() {
                    record.insert(name.to_string(), Value::Text(extension.text.clone()));
                }
            }
            Some(ExtensionRule::Expand) => {
                for child in extension
                    .children
                    .iter()
                    .filter(|c| c.is_leaf() && !c.text.is_empty())
                {
                    record.insert(child.local_name.clone(), Value::Text(child.text.clone()));
                }
            }
            None => {}
        }
    }
    record
}
