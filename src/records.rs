//! Normalized trip-start rows.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

/// One trip start: when and where it began.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

impl TripRecord {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }
}

/// Result of a load: the accepted rows plus diagnostics about rejected ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRecords {
    pub records: Vec<TripRecord>,
    /// Data rows read from the source, capped by the row limit.
    pub rows_read: usize,
    /// Rows dropped because a timestamp or coordinate failed to parse.
    pub skipped_rows: usize,
}

impl LoadedRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
