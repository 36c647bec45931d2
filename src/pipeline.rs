//! Resolve → load → filter → bin, producing the map and chart documents for
//! one (date key, hour) selection.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheKey, RecordCache};
use crate::error::Result;
use crate::fetch::{HttpClient, read_source};
use crate::output::{ChartDocument, MapDocument};
use crate::parser::{DEFAULT_ROW_LIMIT, parse_records};
use crate::records::LoadedRecords;
use crate::source::{DateKey, SourceCatalog};
use crate::stats::{
    HistogramShape, build_histogram, check_hour, filter_by_hour, filter_by_hour_window,
};

/// Fetches `location` once and parses at most `row_limit` rows from it.
///
/// # Errors
///
/// [`crate::PipelineError::SourceUnavailable`] if the fetch fails and
/// [`crate::PipelineError::SchemaMismatch`] if expected columns are missing.
/// Malformed rows are skipped, not reported as errors.
#[tracing::instrument(skip(client), fields(source = %location, row_limit))]
pub async fn load_records<C: HttpClient + ?Sized>(
    client: &C,
    location: &str,
    row_limit: usize,
) -> Result<LoadedRecords> {
    let bytes = read_source(client, location).await?;
    let loaded = parse_records(&bytes, row_limit)?;
    info!(
        records = loaded.len(),
        rows_read = loaded.rows_read,
        skipped = loaded.skipped_rows,
        "Trip starts loaded"
    );
    Ok(loaded)
}

/// Everything the dashboard renders for one selection.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub date_key: DateKey,
    pub hour: u32,
    pub source: String,
    /// Shared by both density maps.
    pub map: MapDocument,
    pub chart: ChartDocument,
    pub rows_read: usize,
    pub skipped_rows: usize,
}

pub struct TripDataPipeline<C> {
    client: C,
    catalog: SourceCatalog,
    row_limit: usize,
    shape: HistogramShape,
    cache: RecordCache,
}

impl<C: HttpClient> TripDataPipeline<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            catalog: SourceCatalog::builtin(),
            row_limit: DEFAULT_ROW_LIMIT,
            shape: HistogramShape::default(),
            cache: RecordCache::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: SourceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    pub fn with_shape(mut self, shape: HistogramShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn resolve_source(&self, key: DateKey) -> &str {
        self.catalog.resolve(key)
    }

    /// Uncached load of `location`.
    pub async fn load_records(&self, location: &str, row_limit: usize) -> Result<LoadedRecords> {
        load_records(&self.client, location, row_limit).await
    }

    /// Loads the dataset for `key`, reusing a previous or concurrent load of
    /// the same location and row cap.
    pub async fn load_for(&self, key: DateKey) -> Result<Arc<LoadedRecords>> {
        let location = self.resolve_source(key);
        let cache_key = CacheKey::new(location, self.row_limit);

        self.cache
            .get_or_load(cache_key, || self.load_records(location, self.row_limit))
            .await
    }

    /// Derives the map and chart documents from an already-loaded dataset.
    pub fn view_of(&self, key: DateKey, hour: u32, loaded: &LoadedRecords) -> Result<DashboardView> {
        let hour = check_hour(hour)?;

        let on_map = filter_by_hour(&loaded.records, hour)?;
        let in_window = filter_by_hour_window(&loaded.records, hour)?;
        let histogram = build_histogram(&in_window, self.shape);

        debug!(
            date_key = %key,
            hour,
            map_points = on_map.len(),
            histogram_total = histogram.total(),
            "View derived"
        );

        Ok(DashboardView {
            date_key: key,
            hour,
            source: self.resolve_source(key).to_string(),
            map: MapDocument::new(hour, &on_map),
            chart: ChartDocument::new(hour, &histogram),
            rows_read: loaded.rows_read,
            skipped_rows: loaded.skipped_rows,
        })
    }

    /// Full run for one selection.
    #[tracing::instrument(skip(self), fields(date_key = %key, hour))]
    pub async fn view(&self, key: DateKey, hour: u32) -> Result<DashboardView> {
        // Fail on a bad hour before paying for a fetch.
        check_hour(hour)?;
        let loaded = self.load_for(key).await?;
        self.view_of(key, hour, &loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: &str = "\
timestart,latstartl,lonstartl
2019-01-01 05:10:00,13.75,100.50
2019-01-01 05:59:00,13.76,100.51
2019-01-01 06:00:00,13.77,100.52
garbage,13.77,100.52
";

    struct CountingClient {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl CountingClient {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CountingClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let resp = http::Response::builder().status(200).body(self.body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_view_scenario() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY));
        let view = pipeline.view(DateKey::Jan1, 5).await.unwrap();

        assert_eq!(view.map.points.len(), 2);
        assert_eq!(view.chart.summary.total, 2);
        assert_eq!(view.chart.buckets[4].count, 1);
        assert_eq!(view.chart.buckets[23].count, 1);
        assert_eq!(view.rows_read, 4);
        assert_eq!(view.skipped_rows, 1);
        assert!(view.source.ends_with("20190101.csv"));
    }

    #[tokio::test]
    async fn test_load_is_repeatable() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY));
        let url = pipeline.resolve_source(DateKey::Jan2).to_string();
        let first = pipeline.load_records(&url, DEFAULT_ROW_LIMIT).await.unwrap();
        let second = pipeline.load_records(&url, DEFAULT_ROW_LIMIT).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_reuses_identical_selection() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY));
        pipeline.view(DateKey::Jan3, 5).await.unwrap();
        pipeline.view(DateKey::Jan3, 6).await.unwrap();
        assert_eq!(pipeline.client.calls.load(Ordering::SeqCst), 1);

        pipeline.view(DateKey::Jan4, 5).await.unwrap();
        assert_eq!(pipeline.client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.cache().len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_views_fetch_once() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY));
        let (a, b) = tokio::join!(
            pipeline.view(DateKey::Jan1, 5),
            pipeline.view(DateKey::Jan1, 6)
        );
        assert_eq!(a.unwrap().map.points.len(), 2);
        assert_eq!(b.unwrap().map.points.len(), 1);
        assert_eq!(pipeline.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_row_limit_caps_rows_read() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY)).with_row_limit(1);
        let view = pipeline.view(DateKey::Jan1, 5).await.unwrap();
        assert_eq!(view.rows_read, 1);
        assert_eq!(view.map.points.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_hour_skips_fetch() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY));
        let err = pipeline.view(DateKey::Jan1, 24).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidHour(24)));
        assert_eq!(pipeline.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schema_error_is_not_cached() {
        let pipeline = TripDataPipeline::new(CountingClient::new("a,b,c\n1,2,3\n"));
        assert!(matches!(
            pipeline.view(DateKey::Jan1, 0).await,
            Err(PipelineError::SchemaMismatch { .. })
        ));
        assert_eq!(pipeline.cache().len().await, 0);
    }

    #[tokio::test]
    async fn test_custom_shape() {
        let pipeline = TripDataPipeline::new(CountingClient::new(DAY))
            .with_shape(HistogramShape::new(24, 23).unwrap());
        let view = pipeline.view(DateKey::Jan5, 5).await.unwrap();
        assert_eq!(view.chart.buckets[10].count, 1);
        assert_eq!(view.chart.buckets[23].count, 1);
    }
}
