//! Reindexing onto a one-second grid.
//!
//! Records are binned by whole second; within a bin the latest observation
//! wins. Empty seconds are forward filled field by field, then whatever is
//! still missing at the head of the series is backward filled.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::record::{CanonicalRecord, TimeSeries};
use crate::{Params, TrackError};

pub fn resample(records: Vec<CanonicalRecord>, params: &Params) -> Result<TimeSeries, TrackError> {
    let (t_min, t_max) = match (
        records.iter().map(|r| r.timestamp.timestamp()).min(),
        records.iter().map(|r| r.timestamp.timestamp()).max(),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(TrackError::EmptyRecordSet),
    };

    let span = (t_max - t_min) as u64;
    if let Some(limit) = params.max_span_s {
        if span > limit {
            return Err(TrackError::SpanTooLarge {
                span_s: span,
                limit_s: limit,
            });
        }
    }

    let raw_count = records.len();
    let bins = bin_by_second(records);
    debug!(
        "resampling {} records into {} seconds ({} occupied)",
        raw_count,
        span + 1,
        bins.len()
    );

    let mut rows = Vec::with_capacity(grid_capacity(span, raw_count));
    let mut bins = bins.into_iter().peekable();
    for second in t_min..=t_max {
        let timestamp = whole_second(second)?;
        let mut row = match bins.next_if(|(key, _)| *key == second) {
            Some((_, record)) => record,
            None => CanonicalRecord::new(timestamp),
        };
        row.timestamp = timestamp;
        if let Some(prev) = rows.last() {
            row.fill_from(prev);
        }
        rows.push(row);
    }

    // Only leading gaps can remain after the forward pass.
    for idx in (0..rows.len().saturating_sub(1)).rev() {
        let (head, tail) = rows.split_at_mut(idx + 1);
        head[idx].fill_from(&tail[0]);
    }

    Ok(TimeSeries::from_records(rows))
}

const GRID_RESERVE_PER_RECORD: usize = 4;

/// Rows reserved up front. Bounded by the record count so an unguarded
/// span grows the grid as it fills instead of reserving it all at once.
fn grid_capacity(span: u64, raw_count: usize) -> usize {
    let grid = usize::try_from(span).unwrap_or(usize::MAX).saturating_add(1);
    grid.min(raw_count.saturating_mul(GRID_RESERVE_PER_RECORD).max(1))
}

/// Last observation per whole second; ties go to the later record in source order.
fn bin_by_second(records: Vec<CanonicalRecord>) -> BTreeMap<i64, CanonicalRecord> {
    let mut bins: BTreeMap<i64, CanonicalRecord> = BTreeMap::new();
    for record in records {
        let key = record.timestamp.timestamp();
        match bins.get(&key) {
            Some(existing) if existing.timestamp > record.timestamp => {}
            _ => {
                bins.insert(key, record);
            }
        }
    }
    bins
}

fn whole_second(second: i64) -> Result<DateTime<Utc>, TrackError> {
    Utc.timestamp_opt(second, 0)
        .single()
        .ok_or_else(|| TrackError::InvalidTimestamp(second.to_string()))
}
