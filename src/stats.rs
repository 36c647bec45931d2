//! Hour filtering and per-minute histogram binning.

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::records::TripRecord;

/// Rejects hours outside `0..=23`.
pub fn check_hour(hour: u32) -> Result<u32> {
    if hour > 23 {
        return Err(PipelineError::InvalidHour(hour));
    }
    Ok(hour)
}

/// Records whose timestamp hour equals `hour`, in source order. Feeds the maps.
pub fn filter_by_hour(records: &[TripRecord], hour: u32) -> Result<Vec<TripRecord>> {
    let hour = check_hour(hour)?;
    Ok(records.iter().filter(|r| r.hour() == hour).cloned().collect())
}

/// Records whose timestamp hour is in `[hour, hour + 1)`. Feeds the histogram.
///
/// A one-hour window over whole hours selects exactly the same rows as
/// [`filter_by_hour`].
pub fn filter_by_hour_window(records: &[TripRecord], hour: u32) -> Result<Vec<TripRecord>> {
    let start = check_hour(hour)?;
    let end = start + 1;
    Ok(records
        .iter()
        .filter(|r| (start..end).contains(&r.hour()))
        .cloned()
        .collect())
}

/// Bucket layout over minute-of-hour: `bucket_count` equal-width buckets
/// spanning `[0, range_max]`, last bucket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramShape {
    pub bucket_count: usize,
    pub range_max: u32,
}

impl Default for HistogramShape {
    /// 24 buckets of 2.5 minutes each across the whole hour.
    fn default() -> Self {
        Self {
            bucket_count: 24,
            range_max: 60,
        }
    }
}

impl HistogramShape {
    pub fn new(bucket_count: usize, range_max: u32) -> Result<Self> {
        if bucket_count == 0 {
            return Err(PipelineError::InvalidHistogramShape(
                "bucket count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            bucket_count,
            range_max,
        })
    }

    /// Bucket for `minute`. Values at or past `range_max` go to the last bucket.
    pub fn bucket_of(&self, minute: u32) -> usize {
        let last = self.bucket_count - 1;
        if self.range_max == 0 {
            return last;
        }
        let idx = (minute as u64 * self.bucket_count as u64) / self.range_max as u64;
        (idx as usize).min(last)
    }

    /// Lower edge of bucket `idx`, in minutes.
    pub fn lower_edge(&self, idx: usize) -> f64 {
        idx as f64 * self.range_max as f64 / self.bucket_count as f64
    }
}

/// Dense per-bucket trip counts in ascending minute order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinuteHistogram {
    pub shape: HistogramShape,
    pub counts: Vec<u64>,
}

/// Peak and total of a [`MinuteHistogram`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub total: u64,
    pub peak_bucket: usize,
    pub peak_count: u64,
    pub peak_minute: f64,
}

impl MinuteHistogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Earliest bucket wins ties; an empty histogram peaks at bucket 0 with 0.
    pub fn summary(&self) -> HistogramSummary {
        let (peak_bucket, peak_count) = self
            .counts
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0), |best, (idx, count)| {
                if count > best.1 { (idx, count) } else { best }
            });

        HistogramSummary {
            total: self.total(),
            peak_bucket,
            peak_count,
            peak_minute: self.shape.lower_edge(peak_bucket),
        }
    }
}

/// Counts `records` per minute-of-hour bucket. Every record lands in exactly
/// one bucket, so the counts sum to `records.len()`.
pub fn build_histogram(records: &[TripRecord], shape: HistogramShape) -> MinuteHistogram {
    let mut counts = vec![0u64; shape.bucket_count];
    for r in records {
        counts[shape.bucket_of(r.minute())] += 1;
    }
    MinuteHistogram { shape, counts }
}
