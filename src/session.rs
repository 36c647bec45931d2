//! Interactive selection state: the latest date key and its load.
//!
//! Selecting a new date while the previous load is still running aborts that
//! load, so a slow fetch for a superseded day can never overwrite a newer one.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::fetch::HttpClient;
use crate::pipeline::{DashboardView, TripDataPipeline};
use crate::records::LoadedRecords;
use crate::source::DateKey;

type LoadHandle = JoinHandle<Result<Arc<LoadedRecords>>>;

pub struct SelectionSession<C> {
    pipeline: Arc<TripDataPipeline<C>>,
    in_flight: Option<(DateKey, LoadHandle)>,
    loaded: Option<(DateKey, Arc<LoadedRecords>)>,
}

impl<C: HttpClient + 'static> SelectionSession<C> {
    pub fn new(pipeline: Arc<TripDataPipeline<C>>) -> Self {
        Self {
            pipeline,
            in_flight: None,
            loaded: None,
        }
    }

    /// Key of the load currently running, if any.
    pub fn pending(&self) -> Option<DateKey> {
        self.in_flight
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(key, _)| *key)
    }

    /// Starts loading `key` in the background, aborting any unfinished load
    /// for a different key. Records of the previous selection are dropped, so
    /// a failed load never falls back to them.
    pub fn select(&mut self, key: DateKey) {
        if self.pending() == Some(key) {
            debug!(date_key = %key, "Selection unchanged, keeping in-flight load");
            return;
        }
        self.loaded = None;

        if let Some((stale, handle)) = self.in_flight.take() {
            if !handle.is_finished() {
                info!(stale = %stale, date_key = %key, "Aborting superseded load");
                handle.abort();
            }
        }

        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move { pipeline.load_for(key).await });
        self.in_flight = Some((key, handle));
    }

    /// Aborts the in-flight load. The next [`Self::view`] reports
    /// [`PipelineError::Cancelled`], later ones [`PipelineError::NothingSelected`].
    pub fn cancel(&mut self) {
        self.loaded = None;
        if let Some((key, handle)) = &self.in_flight {
            info!(date_key = %key, "Cancelling load");
            handle.abort();
        }
    }

    /// Waits for the latest selection to finish loading and derives the view
    /// for `hour`. Changing only the hour reuses the loaded records.
    pub async fn view(&mut self, hour: u32) -> Result<DashboardView> {
        if let Some((key, handle)) = self.in_flight.take() {
            let loaded = match handle.await {
                Ok(result) => result?,
                Err(e) if e.is_cancelled() => return Err(PipelineError::Cancelled),
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            };
            self.loaded = Some((key, loaded));
        }

        let (key, loaded) = self.loaded.as_ref().ok_or(PipelineError::NothingSelected)?;
        self.pipeline.view_of(*key, hour, loaded)
    }
}

impl<C> Drop for SelectionSession<C> {
    fn drop(&mut self) {
        if let Some((_, handle)) = &self.in_flight {
            handle.abort();
        }
    }
}
