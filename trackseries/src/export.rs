//! CSV rendering of a resampled series.

use std::io::Write;

use crate::normalize::TIMESTAMP_FIELD;
use crate::record::{format_timestamp, TimeSeries};
use crate::TrackError;

/// Write `timestamp` followed by every column present in the series, one row per second.
pub fn write_csv<W: Write>(series: &TimeSeries, writer: W) -> Result<(), TrackError> {
    let columns = series.columns();
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push(TIMESTAMP_FIELD.to_string());
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;

    for record in series {
        let mut row = Vec::with_capacity(header.len());
        row.push(format_timestamp(&record.timestamp));
        for column in &columns {
            row.push(record.cell(column).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Render the CSV into memory.
pub fn to_csv_bytes(series: &TimeSeries) -> Result<Vec<u8>, TrackError> {
    let mut out = Vec::new();
    write_csv(series, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CanonicalRecord, Value};
    use chrono::{TimeZone, Utc};

    #[test]
    fn writes_header_and_rows() {
        let mut first = CanonicalRecord::new(Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap());
        first.altitude = Some(10.5);
        first.heart_rate = Some(120.0);
        first.extra.insert("speed".into(), Value::Text("3.0".into()));
        let mut second = first.clone();
        second.timestamp = Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 6).unwrap();
        second.altitude = Some(11.0);
        let series = TimeSeries::from_records(vec![first, second]);

        let text = String::from_utf8(to_csv_bytes(&series).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,altitude,heart_rate,speed",
                "2021-01-02T03:04:05Z,10.5,120,3.0",
                "2021-01-02T03:04:06Z,11,120,3.0",
            ]
        );
    }

    #[test]
    fn empty_series_has_only_a_header() {
        let text = String::from_utf8(to_csv_bytes(&TimeSeries::default()).unwrap()).unwrap();
        assert_eq!(text, "timestamp\n");
    }
}
