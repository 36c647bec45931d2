//! CSV parser for trip-start sources.
//!
//! Only three columns are read: `timestart`, `latstartl` and `lonstartl`.
//! Header names are matched after trimming and lowercasing, so `TimeStart`
//! and ` LATSTARTL ` are both accepted.

use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::records::{LoadedRecords, TripRecord};

/// Maximum number of data rows read from a single source.
pub const DEFAULT_ROW_LIMIT: usize = 100_000;

pub const TIMESTAMP_COLUMN: &str = "timestart";
pub const LATITUDE_COLUMN: &str = "latstartl";
pub const LONGITUDE_COLUMN: &str = "lonstartl";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

struct ColumnIndex {
    timestamp: usize,
    latitude: usize,
    longitude: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| normalized.iter().position(|h| h == name);

        match (
            find(TIMESTAMP_COLUMN),
            find(LATITUDE_COLUMN),
            find(LONGITUDE_COLUMN),
        ) {
            (Some(timestamp), Some(latitude), Some(longitude)) => Ok(Self {
                timestamp,
                latitude,
                longitude,
            }),
            (t, la, lo) => {
                let missing = [
                    (t, TIMESTAMP_COLUMN),
                    (la, LATITUDE_COLUMN),
                    (lo, LONGITUDE_COLUMN),
                ]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name.to_string())
                .collect();
                Err(PipelineError::SchemaMismatch { missing })
            }
        }
    }
}

/// Decodes comma-separated trip starts, reading at most `row_limit` data rows.
///
/// Rows with an unparsable timestamp or coordinate are skipped and counted in
/// [`LoadedRecords::skipped_rows`].
///
/// # Errors
///
/// Returns [`PipelineError::SchemaMismatch`] if any of the three expected
/// columns is absent from the header row, or the header row cannot be decoded.
pub fn parse_records(bytes: &[u8], row_limit: usize) -> Result<LoadedRecords> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(|e| {
        warn!(error = %e, "Unreadable header row");
        PipelineError::SchemaMismatch {
            missing: vec![
                TIMESTAMP_COLUMN.to_string(),
                LATITUDE_COLUMN.to_string(),
                LONGITUDE_COLUMN.to_string(),
            ],
        }
    })?;
    let columns = ColumnIndex::from_headers(headers)?;
    let mut loaded = LoadedRecords::default();

    for (idx, result) in rdr.records().take(row_limit).enumerate() {
        let row = idx + 1;
        loaded.rows_read += 1;

        let parsed = result
            .map_err(|e| PipelineError::MalformedRecord {
                row,
                reason: e.to_string(),
            })
            .and_then(|record| parse_row(&record, &columns, row));

        match parsed {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                debug!(error = %e, "Skipping row");
                loaded.skipped_rows += 1;
            }
        }
    }

    if loaded.skipped_rows > 0 {
        warn!(
            skipped = loaded.skipped_rows,
            rows_read = loaded.rows_read,
            "Malformed rows skipped"
        );
    }

    Ok(loaded)
}

fn parse_row(record: &StringRecord, columns: &ColumnIndex, row: usize) -> Result<TripRecord> {
    let field = |idx: usize, name: &str| {
        record.get(idx).ok_or_else(|| PipelineError::MalformedRecord {
            row,
            reason: format!("missing {name} field"),
        })
    };

    let raw_ts = field(columns.timestamp, TIMESTAMP_COLUMN)?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| PipelineError::MalformedRecord {
        row,
        reason: format!("unparsable timestamp '{raw_ts}'"),
    })?;

    let latitude = parse_coordinate(field(columns.latitude, LATITUDE_COLUMN)?, row)?;
    let longitude = parse_coordinate(field(columns.longitude, LONGITUDE_COLUMN)?, row)?;

    Ok(TripRecord {
        timestamp,
        latitude,
        longitude,
    })
}

/// Parses the timestamp layouts seen in trip-start exports. RFC 3339 values
/// keep their wall-clock time and drop the offset.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn parse_coordinate(raw: &str, row: usize) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PipelineError::MalformedRecord {
            row,
            reason: format!("unparsable coordinate '{raw}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    const SAMPLE: &str = "\
TimeStart,LatStartl,LonStartl,extra
2019-01-01 05:10:00,13.75,100.50,a
2019-01-01 05:59:00,13.76,100.51,b
2019-01-01 06:00:00,13.77,100.52,c
";

    #[test]
    fn test_parse_selects_and_normalizes_columns() {
        let loaded = parse_records(SAMPLE.as_bytes(), DEFAULT_ROW_LIMIT).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.rows_read, 3);
        assert_eq!(loaded.skipped_rows, 0);

        let first = &loaded.records[0];
        assert_eq!(
            first.timestamp,
            NaiveDate::from_ymd_opt(2019, 1, 1)
                .unwrap()
                .and_hms_opt(5, 10, 0)
                .unwrap()
        );
        assert_eq!(first.latitude, 13.75);
        assert_eq!(first.longitude, 100.50);
    }

    #[test]
    fn test_parse_column_order_independent() {
        let csv = "lonstartl,timestart,latstartl\n100.5,2019-01-02 10:00:00,13.7\n";
        let loaded = parse_records(csv.as_bytes(), DEFAULT_ROW_LIMIT).unwrap();
        assert_eq!(loaded.records[0].latitude, 13.7);
        assert_eq!(loaded.records[0].longitude, 100.5);
        assert_eq!(loaded.records[0].hour(), 10);
    }

    #[test]
    fn test_parse_missing_column() {
        let csv = "timestart,latstartl\n2019-01-01 05:10:00,13.75\n";
        let err = parse_records(csv.as_bytes(), DEFAULT_ROW_LIMIT).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["lonstartl".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_empty_input_is_schema_mismatch() {
        let err = parse_records(b"", DEFAULT_ROW_LIMIT).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { missing } if missing.len() == 3));
    }

    #[test]
    fn test_parse_undecodable_header_is_schema_mismatch() {
        let bytes = b"time\xffstart,latstartl,lonstartl\n2019-01-01 05:10:00,13.75,100.50\n";
        let err = parse_records(bytes, DEFAULT_ROW_LIMIT).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { missing } if missing.len() == 3));
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let csv = "\
timestart,latstartl,lonstartl
2019-01-01 05:10:00,13.75,100.50
not a time,13.75,100.50
2019-01-01 05:12:00,north,100.50
2019-01-01 05:13:00,13.75
2019-01-01 05:14:00,NaN,100.50
2019-01-01 05:15:00,13.75,100.50
";
        let loaded = parse_records(csv.as_bytes(), DEFAULT_ROW_LIMIT).unwrap();
        assert_eq!(loaded.rows_read, 6);
        assert_eq!(loaded.skipped_rows, 4);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[1].minute(), 15);
    }

    #[test]
    fn test_parse_respects_row_limit() {
        let loaded = parse_records(SAMPLE.as_bytes(), 2).unwrap();
        assert_eq!(loaded.rows_read, 2);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        for raw in [
            "2019-01-01 05:10:00",
            "2019-01-01 05:10:00.250",
            "2019-01-01 05:10",
            "2019-01-01T05:10:00",
            "01/01/2019 05:10:00",
            "01/01/2019 05:10",
            "2019-01-01T05:10:00+07:00",
        ] {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!((ts.hour(), ts.minute()), (5, 10), "{raw}");
        }
        assert!(parse_timestamp("2019-13-01 05:10:00").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
