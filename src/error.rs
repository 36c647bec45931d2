//! Error taxonomy for the trip-start pipeline.

use thiserror::Error;

/// Errors raised while resolving, loading, filtering or binning trip starts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The date key is not one of the recognized selectors.
    #[error("unrecognized date selector '{0}'")]
    UnrecognizedSelector(String),

    /// The resource could not be fetched or read.
    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// Expected columns are missing from the header row.
    #[error("schema mismatch: missing column(s) {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// A single data row could not be parsed. Recovered by the loader.
    #[error("malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("hour {0} is outside 0..=23")]
    InvalidHour(u32),

    #[error("invalid histogram shape: {0}")]
    InvalidHistogramShape(String),

    /// An in-flight load was aborted before it completed.
    #[error("load cancelled before completion")]
    Cancelled,

    #[error("no date has been selected")]
    NothingSelected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn unavailable(url: &str, reason: impl ToString) -> Self {
        PipelineError::SourceUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
