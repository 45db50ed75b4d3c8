//! Normalize FIT, GPX and TCX tracks into a gap-free per-second time series.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod export;
pub mod fit;
pub mod gpx;
pub mod normalize;
pub mod record;
pub mod resample;
pub mod tcx;
pub mod xml;

pub use export::{to_csv_bytes, write_csv};
pub use record::{CanonicalField, CanonicalRecord, RawRecord, TimeSeries, Value};
pub use resample::resample;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse FIT file: {0}")]
    FitParse(String),
    #[error("failed to parse GPX file: {0}")]
    GpxParse(String),
    #[error("failed to parse TCX file: {0}")]
    TcxParse(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("file contains no timestamped records")]
    EmptyRecordSet,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("invalid value for {field}: {value:?}")]
    InvalidFieldValue { field: String, value: String },
    #[error("{field} out of range: {value}")]
    CoordinateOutOfRange { field: String, value: f64 },
    #[error("record spans {span_s} s, more than the {limit_s} s limit")]
    SpanTooLarge { span_s: u64, limit_s: u64 },
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Default upper bound on the time range of one file: seven days.
pub const DEFAULT_MAX_SPAN_S: u64 = 7 * 24 * 3600;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Params {
    /// Reject files whose timestamps span more than this many seconds.
    /// Guards the per-second grid against corrupt timestamps.
    pub max_span_s: Option<u64>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_span_s: Some(DEFAULT_MAX_SPAN_S),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Format {
    Fit,
    Gpx,
    Tcx,
}

impl Format {
    /// Format for a path, matched case-sensitively on the extension.
    pub fn from_path(path: &Path) -> Result<Self, TrackError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("fit") => Ok(Format::Fit),
            Some("gpx") => Ok(Format::Gpx),
            Some("tcx") => Ok(Format::Tcx),
            _ => Err(TrackError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn field_aliases(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Format::Fit => fit::FIELD_ALIASES,
            Format::Gpx => gpx::FIELD_ALIASES,
            Format::Tcx => tcx::FIELD_ALIASES,
        }
    }

    fn dropped_fields(self) -> &'static [&'static str] {
        match self {
            Format::Fit => fit::DROPPED_FIELDS,
            Format::Gpx => gpx::DROPPED_FIELDS,
            Format::Tcx => tcx::DROPPED_FIELDS,
        }
    }
}

/// Decode, extract and normalize; records keep source order and may share a second.
pub fn parse_records(input: &[u8], format: Format) -> Result<Vec<CanonicalRecord>, TrackError> {
    let raw = match format {
        Format::Fit => fit::read_records(input)?,
        Format::Gpx => gpx::read_records(input)?,
        Format::Tcx => tcx::read_records(input)?,
    };
    debug!("{} raw records from {:?} input", raw.len(), format);
    normalize::normalize_records(raw, format.field_aliases(), format.dropped_fields())
}

/// Full pipeline over in-memory file content.
pub fn parse_bytes(input: &[u8], format: Format, params: &Params) -> Result<TimeSeries, TrackError> {
    let records = parse_records(input, format)?;
    resample(records, params)
}

/// Full pipeline for a file on disk, dispatched on its extension.
pub fn parse_file(path: &Path, params: &Params) -> Result<TimeSeries, TrackError> {
    let format = Format::from_path(path)?;
    let data = fs::read(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes(&data, format, params)
}
