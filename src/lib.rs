pub mod cache;
pub mod error;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod records;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{PipelineError, Result};
pub use pipeline::{DashboardView, TripDataPipeline};
pub use records::{LoadedRecords, TripRecord};
pub use source::{DateKey, SourceCatalog};
