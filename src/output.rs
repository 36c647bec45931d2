//! Documents handed to the map and chart widgets, and their persistence.
//!
//! Supports JSON files and CSV append.

use std::fs::OpenOptions;
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::records::TripRecord;
use crate::stats::{HistogramSummary, MinuteHistogram};

/// Bangkok city centre.
pub const MAP_CENTER: (f64, f64) = (13.7563, 100.5018);
pub const MAP_ZOOM: u8 = 12;
pub const MAP_PITCH: u8 = 50;
pub const MAP_STYLE: &str = "mapbox://styles/mapbox/light-v9";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    pub pitch: u8,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            latitude: MAP_CENTER.0,
            longitude: MAP_CENTER.1,
            zoom: MAP_ZOOM,
            pitch: MAP_PITCH,
        }
    }
}

/// Hexagon aggregation settings for the density layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HexagonLayer {
    pub kind: &'static str,
    pub radius: u32,
    pub elevation_scale: u32,
    pub elevation_range: [u32; 2],
    pub pickable: bool,
    pub extruded: bool,
}

impl Default for HexagonLayer {
    fn default() -> Self {
        Self {
            kind: "HexagonLayer",
            radius: 100,
            elevation_scale: 4,
            elevation_range: [0, 1000],
            pickable: true,
            extruded: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&TripRecord> for MapPoint {
    fn from(r: &TripRecord) -> Self {
        Self {
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

/// Point set plus view hints for a density map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapDocument {
    pub title: String,
    pub map_style: &'static str,
    pub view_state: ViewState,
    pub layer: HexagonLayer,
    pub points: Vec<MapPoint>,
}

impl MapDocument {
    pub fn new(hour: u32, records: &[TripRecord]) -> Self {
        Self {
            title: format!("All started from {}", hour_span(hour)),
            map_style: MAP_STYLE,
            view_state: ViewState::default(),
            layer: HexagonLayer::default(),
            points: records.iter().map(MapPoint::from).collect(),
        }
    }
}

/// One histogram row: bucket index, its lower edge in minutes, and its count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub bucket: usize,
    pub minute: f64,
    pub count: u64,
}

/// Area-chart input derived from a [`MinuteHistogram`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDocument {
    pub title: String,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub interpolate: &'static str,
    pub buckets: Vec<ChartRow>,
    pub summary: HistogramSummary,
}

impl ChartDocument {
    pub fn new(hour: u32, histogram: &MinuteHistogram) -> Self {
        Self {
            title: format!("Trip starts per minute between {}", hour_span(hour)),
            x_label: "minute",
            y_label: "count",
            interpolate: "step-after",
            buckets: chart_rows(histogram),
            summary: histogram.summary(),
        }
    }
}

pub fn chart_rows(histogram: &MinuteHistogram) -> Vec<ChartRow> {
    histogram
        .counts
        .iter()
        .enumerate()
        .map(|(bucket, &count)| ChartRow {
            bucket,
            minute: histogram.shape.lower_edge(bucket),
            count,
        })
        .collect()
}

/// `"H:00 and H+1:00"`, wrapping midnight.
pub fn hour_span(hour: u32) -> String {
    format!("{}:00 and {}:00", hour, (hour + 1) % 24)
}

/// Writes `value` as pretty JSON to `path`, replacing any existing file.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, body)?;
    debug!(path = %path.display(), "JSON document written");
    Ok(())
}

/// Appends histogram rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_histogram(path: &str, histogram: &MinuteHistogram) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending histogram rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for row in chart_rows(histogram) {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
